use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::error::VaultError;
use crate::graph::VaultGraph;
use crate::note::NoteId;
use crate::planner::{Operation, Plan, SpanEdit};

/// Filesystem access used by the applier. Real runs go through [`OsFs`];
/// tests inject failing implementations to exercise rollback.
pub trait VaultFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// The real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFs;

impl VaultFs for OsFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Counts of what an apply actually did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub files_moved: usize,
    pub files_rewritten: usize,
}

/// Executes a plan with all-or-nothing semantics.
///
/// Content is staged at pre-move paths first and moves run last; every
/// mutation is journaled beforehand, and any failure unwinds the journal in
/// reverse so the vault ends byte-identical to its pre-apply state.
pub struct Applier<F: VaultFs> {
    fs: F,
}

impl Applier<OsFs> {
    pub fn new() -> Self {
        Self { fs: OsFs }
    }
}

impl Default for Applier<OsFs> {
    fn default() -> Self {
        Self::new()
    }
}

enum Undo {
    Restore { path: PathBuf, bytes: Vec<u8> },
    Unmove { from: PathBuf, to: PathBuf },
    /// Directories created for a move destination, deepest first.
    RemoveDirs { dirs: Vec<PathBuf> },
}

impl<F: VaultFs> Applier<F> {
    pub fn with_fs(fs: F) -> Self {
        Self { fs }
    }

    pub fn apply(&self, plan: &Plan, graph: &VaultGraph) -> Result<ApplyReport, VaultError> {
        let root = graph.root().to_path_buf();
        let moves = collect_moves(plan);
        let writes = collect_content_writes(plan, graph)?;

        self.preflight(&root, plan, &moves, &writes)?;

        let mut journal: Vec<Undo> = Vec::new();
        let mut report = ApplyReport::default();

        for write in &writes {
            let abs = root.join(&write.path);
            if let Err(err) = self.stage_write(&abs, &write.content, &mut journal) {
                self.rollback(journal);
                return Err(VaultError::PartialFailure {
                    operation: write.operation.clone(),
                    reason: err.to_string(),
                });
            }
            report.files_rewritten += 1;
        }

        for (note, (old, new)) in &moves {
            let from = root.join(old);
            let to = root.join(new);
            if let Err(err) = self.stage_move(&from, &to, &mut journal) {
                self.rollback(journal);
                return Err(VaultError::PartialFailure {
                    operation: describe_move(plan, *note),
                    reason: err.to_string(),
                });
            }
            report.files_moved += 1;
        }

        debug!(
            moved = report.files_moved,
            rewritten = report.files_rewritten,
            "plan applied"
        );
        Ok(report)
    }

    /// Re-validates the plan against the live filesystem before any
    /// mutation. A mismatch means the vault changed since the snapshot was
    /// taken: a hard abort, never a retry.
    fn preflight(
        &self,
        root: &Path,
        plan: &Plan,
        moves: &BTreeMap<NoteId, (String, String)>,
        writes: &[ContentWrite],
    ) -> Result<(), VaultError> {
        for write in writes {
            let abs = root.join(&write.path);
            if !self.fs.exists(&abs) {
                return Err(VaultError::PlanConflict(format!(
                    "{} vanished since the plan was computed",
                    write.path
                )));
            }
        }

        for (note, (old, new)) in moves {
            let from = root.join(old);
            if !self.fs.exists(&from) {
                return Err(VaultError::PlanConflict(format!(
                    "{old} vanished since the plan was computed"
                )));
            }
            // Case-only renames legitimately see their own destination on
            // case-insensitive filesystems.
            let case_only = old.eq_ignore_ascii_case(new);
            if !case_only && self.fs.exists(&root.join(new)) {
                warn!(note = ?note, %new, "destination already occupied");
                return Err(VaultError::PlanConflict(format!(
                    "destination {new} already exists; the snapshot is stale"
                )));
            }
        }
        Ok(())
    }

    fn stage_write(
        &self,
        abs: &Path,
        content: &str,
        journal: &mut Vec<Undo>,
    ) -> io::Result<()> {
        // Journal the bytes as they are right now, not the snapshot's copy,
        // so rollback restores exactly what apply found on disk.
        let original = self.fs.read(abs)?;
        journal.push(Undo::Restore {
            path: abs.to_path_buf(),
            bytes: original,
        });
        self.fs.write(abs, content.as_bytes())
    }

    fn stage_move(&self, from: &Path, to: &Path, journal: &mut Vec<Undo>) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            let mut created: Vec<PathBuf> = Vec::new();
            let mut cursor = parent;
            while !self.fs.exists(cursor) {
                created.push(cursor.to_path_buf());
                match cursor.parent() {
                    Some(up) => cursor = up,
                    None => break,
                }
            }
            self.fs.create_dir_all(parent)?;
            if !created.is_empty() {
                journal.push(Undo::RemoveDirs { dirs: created });
            }
        }
        self.fs.rename(from, to)?;
        journal.push(Undo::Unmove {
            from: to.to_path_buf(),
            to: from.to_path_buf(),
        });
        Ok(())
    }

    fn rollback(&self, journal: Vec<Undo>) {
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Restore { path, bytes } => {
                    if let Err(err) = self.fs.write(&path, &bytes) {
                        error!(path = %path.display(), %err, "rollback write failed; vault may need manual repair");
                    }
                }
                Undo::Unmove { from, to } => {
                    if let Err(err) = self.fs.rename(&from, &to) {
                        error!(from = %from.display(), %err, "rollback move failed; vault may need manual repair");
                    }
                }
                Undo::RemoveDirs { dirs } => {
                    for dir in dirs {
                        // A directory that gained unrelated entries stays.
                        let _ = self.fs.remove_dir(&dir);
                    }
                }
            }
        }
    }
}

fn collect_moves(plan: &Plan) -> BTreeMap<NoteId, (String, String)> {
    plan.operations
        .iter()
        .filter_map(|op| match op {
            Operation::MoveFile { note, old, new } => {
                Some((*note, (old.clone(), new.clone())))
            }
            _ => None,
        })
        .collect()
}

fn describe_move(plan: &Plan, note: NoteId) -> String {
    plan.operations
        .iter()
        .find(|op| matches!(op, Operation::MoveFile { note: n, .. } if *n == note))
        .map(Operation::describe)
        .unwrap_or_else(|| format!("move of note {note:?}"))
}

struct ContentWrite {
    path: String,
    content: String,
    /// Description of the first plan operation contributing to this write.
    operation: String,
}

/// Merges every content-affecting operation per note into one new content
/// string, applying span edits end-to-start so earlier offsets stay valid.
fn collect_content_writes(plan: &Plan, graph: &VaultGraph) -> Result<Vec<ContentWrite>, VaultError> {
    let mut per_note: BTreeMap<NoteId, (Vec<SpanEdit>, String)> = BTreeMap::new();

    for op in &plan.operations {
        match op {
            Operation::RewriteContent { note, edits, .. } => {
                let entry = per_note
                    .entry(*note)
                    .or_insert_with(|| (Vec::new(), op.describe()));
                entry.0.extend(edits.iter().cloned());
            }
            Operation::WriteFrontmatter { note, path, mapping } => {
                let span = graph
                    .note(*note)
                    .frontmatter_span
                    .clone()
                    .unwrap_or(0..0);
                let replacement = serialize_frontmatter(mapping)
                    .map_err(|err| err.context(format!("frontmatter of {path}")))?;
                let entry = per_note
                    .entry(*note)
                    .or_insert_with(|| (Vec::new(), op.describe()));
                entry.0.push(SpanEdit { span, replacement });
            }
            Operation::MoveFile { .. } => {}
        }
    }

    let mut out = Vec::new();
    for (note, (mut edits, operation)) in per_note {
        let note = graph.note(note);
        // Zero-width insertions sort ahead of an edit starting at the same
        // offset, so a freshly inserted frontmatter block never trips the
        // overlap check against a reference at byte 0.
        edits.sort_by_key(|edit| (edit.span.start, edit.span.end));
        for pair in edits.windows(2) {
            if pair[1].span.start < pair[0].span.end {
                return Err(VaultError::PlanConflict(format!(
                    "overlapping edits in {}",
                    note.rel_path
                )));
            }
        }

        let mut content = note.content.clone();
        for edit in edits.iter().rev() {
            content.replace_range(edit.span.clone(), &edit.replacement);
        }
        out.push(ContentWrite {
            path: note.rel_path.clone(),
            content,
            operation,
        });
    }
    Ok(out)
}

fn serialize_frontmatter(mapping: &serde_yaml::Mapping) -> Result<String, VaultError> {
    let yaml = serde_yaml::to_string(mapping)?;
    let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
    let mut block = String::with_capacity(yaml.len() + 8);
    block.push_str("---\n");
    block.push_str(yaml);
    if !block.ends_with('\n') {
        block.push('\n');
    }
    block.push_str("---\n");
    Ok(block)
}
