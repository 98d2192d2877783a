use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;

use crate::diagnostics::Warning;
use crate::error::VaultError;
use crate::graph::{VaultGraph, parent_dir};
use crate::naming::{self, NamingConfig};
use crate::note::{NoteId, ReferenceKind, file_stem};
use crate::schema::{self, FrontmatterSchema};

/// Configuration consumed by one planning pass.
#[derive(Clone, Debug, Default)]
pub struct PlanOptions {
    pub naming: NamingConfig,
    pub schema: FrontmatterSchema,
    /// When set, a wikilink's display alias is rewritten to the renamed
    /// target's new title. Off by default: alias text is preserved verbatim.
    pub alias_follows_title: bool,
}

/// One byte-span replacement inside a note's content. Spans never overlap
/// within a plan; every byte outside them is preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpanEdit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// An atomic step of a plan. Content operations name the note's identity and
/// its pre-move path; the applier stages content before performing moves.
#[derive(Clone, Debug)]
pub enum Operation {
    MoveFile {
        note: NoteId,
        old: String,
        new: String,
    },
    RewriteContent {
        note: NoteId,
        path: String,
        edits: Vec<SpanEdit>,
    },
    WriteFrontmatter {
        note: NoteId,
        path: String,
        mapping: serde_yaml::Mapping,
    },
}

impl Operation {
    /// Short human-readable identification, used by failure reporting.
    pub fn describe(&self) -> String {
        match self {
            Operation::MoveFile { old, new, .. } => format!("move {old} -> {new}"),
            Operation::RewriteContent { path, edits, .. } => {
                format!("rewrite {} reference(s) in {path}", edits.len())
            }
            Operation::WriteFrontmatter { path, .. } => format!("write frontmatter of {path}"),
        }
    }
}

/// The fully-computed, immutable set of operations a refactor run intends to
/// perform. The previewer and the applier both consume the same plan value,
/// so preview and execution never diverge.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub operations: Vec<Operation>,
    pub warnings: Vec<Warning>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn moves(&self) -> impl Iterator<Item = (&str, &str)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::MoveFile { old, new, .. } => Some((old.as_str(), new.as_str())),
            _ => None,
        })
    }
}

/// Computes the full plan for one vault snapshot: the whole-vault rename
/// assignment, every downstream reference rewrite it implies, and per-note
/// frontmatter normalization.
pub fn plan(graph: &VaultGraph, options: &PlanOptions) -> Result<Plan, VaultError> {
    let assignment = naming::assign(graph, &options.naming)?;

    let mut renames: BTreeMap<NoteId, (&str, &str)> = BTreeMap::new();
    for note in graph.notes() {
        let new = assignment[&note.id].as_str();
        if new != note.rel_path {
            renames.insert(note.id, (note.rel_path.as_str(), new));
        }
    }

    // Titles that stay duplicated after the renames force path-shaped
    // wikilink targets, so the rewritten reference still resolves uniquely.
    let mut stem_counts: BTreeMap<String, usize> = BTreeMap::new();
    for new_path in assignment.values() {
        *stem_counts
            .entry(file_stem(new_path).to_lowercase())
            .or_default() += 1;
    }

    let mut operations = Vec::new();
    let mut warnings = Vec::new();

    for note in graph.notes() {
        if let Some((old, new)) = renames.get(&note.id) {
            operations.push(Operation::MoveFile {
                note: note.id,
                old: (*old).to_string(),
                new: (*new).to_string(),
            });
        }
    }

    // Reference rewrites are computed against pre-move identities for every
    // note in the vault, not only the moving ones.
    for note in graph.notes() {
        let source_moves = renames.contains_key(&note.id);
        let source_new_dir = parent_dir(&assignment[&note.id]);
        let mut edits = Vec::new();

        for reference in &note.references {
            let Some(target) = reference.target else {
                continue; // unresolved: warned at graph build, never guessed
            };
            if !source_moves && !renames.contains_key(&target) {
                continue;
            }
            let target_new_path = assignment[&target].as_str();
            let fragment = fragment_suffix(&reference.raw_target);

            match reference.kind {
                ReferenceKind::Wikilink => {
                    // Titles are location-independent: a wikilink only needs
                    // rewriting when its target is renamed.
                    if !renames.contains_key(&target) {
                        continue;
                    }
                    let stem = file_stem(target_new_path);
                    let written = if stem_counts[&stem.to_lowercase()] > 1 {
                        target_new_path.strip_suffix(".md").unwrap_or(target_new_path)
                    } else {
                        stem
                    };
                    let new_target = format!("{written}{fragment}");
                    match (&reference.alias, options.alias_follows_title) {
                        (Some(_), true) => edits.push(SpanEdit {
                            span: reference.span.clone(),
                            replacement: format!("[[{new_target}|{stem}]]"),
                        }),
                        _ => {
                            if reference.raw_target != new_target {
                                edits.push(SpanEdit {
                                    span: reference.target_span.clone(),
                                    replacement: new_target,
                                });
                            }
                        }
                    }
                }
                ReferenceKind::InlineLink => {
                    // The link must resolve after both ends move.
                    let new_target = format!(
                        "{}{fragment}",
                        relative_path_between(&source_new_dir, target_new_path)
                    );
                    if reference.raw_target != new_target {
                        edits.push(SpanEdit {
                            span: reference.target_span.clone(),
                            replacement: new_target,
                        });
                    }
                }
            }
        }

        if !edits.is_empty() {
            operations.push(Operation::RewriteContent {
                note: note.id,
                path: note.rel_path.clone(),
                edits,
            });
        }
    }

    if !options.schema.is_empty() {
        for note in graph.notes() {
            // A block that failed to parse is left byte-identical; the parse
            // warning already covers it.
            if note.frontmatter.is_none() && note.frontmatter_span.is_some() {
                continue;
            }
            let current = note.frontmatter.clone().unwrap_or_default();
            let (normalized, violations) = schema::normalize(
                &current,
                &options.schema,
                &note.rel_path,
                &assignment[&note.id],
            );
            warnings.extend(violations);

            if normalized != current {
                operations.push(Operation::WriteFrontmatter {
                    note: note.id,
                    path: note.rel_path.clone(),
                    mapping: normalized,
                });
            }
        }
    }

    debug!(
        operations = operations.len(),
        moves = renames.len(),
        "plan computed"
    );
    Ok(Plan {
        operations,
        warnings,
    })
}

fn fragment_suffix(raw_target: &str) -> &str {
    raw_target
        .find('#')
        .map(|idx| &raw_target[idx..])
        .unwrap_or("")
}

/// Relative path from `from_dir` (vault-relative, `""` for root) to
/// `to_path`, using `..` where the directories diverge.
fn relative_path_between(from_dir: &str, to_path: &str) -> String {
    let from: Vec<&str> = if from_dir.is_empty() {
        Vec::new()
    } else {
        from_dir.split('/').collect()
    };
    let to: Vec<&str> = to_path.split('/').collect();

    let common = from
        .iter()
        .zip(&to[..to.len().saturating_sub(1)])
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from.len() {
        parts.push("..");
    }
    parts.extend(&to[common..]);
    parts.join("/")
}
