use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::diagnostics::{Warning, WarningKind};
use crate::note::{Note, NoteId, file_stem};

/// Outcome of resolving a reference's raw target against the vault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(NoteId),
    /// More than one note matched a title-only target.
    Ambiguous(Vec<NoteId>),
    Missing,
}

/// One consistent snapshot of the vault: every note plus the indexes needed
/// to resolve references and to find every place a rename must propagate.
///
/// The reverse index is a cache derivable from re-parsing, never a second
/// source of truth. Plans are always computed against one graph snapshot.
#[derive(Debug)]
pub struct VaultGraph {
    root: PathBuf,
    notes: Vec<Note>,
    /// Canonical vault-relative path -> identity. Strictly one-to-one.
    by_path: BTreeMap<String, NoteId>,
    /// Lowercased file stem -> all notes carrying that title.
    by_title: BTreeMap<String, Vec<NoteId>>,
    /// Target identity -> every referencing (note, reference index) pair.
    backlinks: BTreeMap<NoteId, Vec<(NoteId, usize)>>,
}

impl VaultGraph {
    /// Builds both indexes in one pass and resolves every reference,
    /// recording a warning per unresolved or ambiguous occurrence.
    pub fn build(root: PathBuf, mut notes: Vec<Note>) -> (Self, Vec<Warning>) {
        let mut by_path = BTreeMap::new();
        let mut by_title: BTreeMap<String, Vec<NoteId>> = BTreeMap::new();

        for note in &notes {
            by_path.insert(note.rel_path.clone(), note.id);
            by_title
                .entry(note.title().to_lowercase())
                .or_default()
                .push(note.id);
        }

        let mut graph = Self {
            root,
            notes: Vec::new(),
            by_path,
            by_title,
            backlinks: BTreeMap::new(),
        };

        let mut warnings = Vec::new();
        let mut backlinks: BTreeMap<NoteId, Vec<(NoteId, usize)>> = BTreeMap::new();

        // Resolution only needs the indexes, so notes can be annotated in place.
        let rel_paths: BTreeMap<NoteId, String> = notes
            .iter()
            .map(|n| (n.id, n.rel_path.clone()))
            .collect();
        for note in &mut notes {
            let from_dir = parent_dir(&note.rel_path);
            for (idx, reference) in note.references.iter_mut().enumerate() {
                match graph.resolve_from_dir(&reference.raw_target, &from_dir) {
                    Resolution::Resolved(target) => {
                        reference.target = Some(target);
                        backlinks.entry(target).or_default().push((note.id, idx));
                    }
                    Resolution::Ambiguous(candidates) => {
                        let listed: Vec<&str> = candidates
                            .iter()
                            .filter_map(|id| rel_paths.get(id).map(String::as_str))
                            .collect();
                        warnings.push(Warning::new(
                            WarningKind::AmbiguousReference,
                            Some(&note.rel_path),
                            format!(
                                "`{}` matches more than one note ({}); leaving it untouched",
                                reference.raw_target,
                                listed.join(", ")
                            ),
                        ));
                    }
                    Resolution::Missing => {
                        warnings.push(Warning::new(
                            WarningKind::UnresolvedReference,
                            Some(&note.rel_path),
                            format!("`{}` matches no note in the vault", reference.raw_target),
                        ));
                    }
                }
            }
        }

        debug!(
            notes = notes.len(),
            unresolved = warnings.len(),
            "vault graph built"
        );
        graph.notes = notes;
        graph.backlinks = backlinks;
        (graph, warnings)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: NoteId) -> &Note {
        &self.notes[id.0 as usize]
    }

    pub fn id_for_path(&self, rel_path: &str) -> Option<NoteId> {
        self.by_path.get(rel_path).copied()
    }

    /// Every referencing `(note, reference index)` occurrence of `target`,
    /// reflecting the graph before any plan is applied.
    pub fn reverse_lookup(&self, target: NoteId) -> &[(NoteId, usize)] {
        self.backlinks
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Maps a reference's raw target text to a note identity.
    ///
    /// Precedence: (1) exact path match, first relative to the referencing
    /// note's directory and then vault-root-relative, with an implied `.md`
    /// extension tried when none is written; (2) exact case-insensitive
    /// title match unique across the vault; (3) unresolved otherwise.
    pub fn resolve(&self, raw_target: &str, from: NoteId) -> Resolution {
        let from_dir = parent_dir(&self.note(from).rel_path);
        self.resolve_from_dir(raw_target, &from_dir)
    }

    fn resolve_from_dir(&self, raw_target: &str, from_dir: &str) -> Resolution {
        let target = strip_fragment(raw_target).trim();
        if target.is_empty() {
            return Resolution::Missing;
        }

        for candidate in path_candidates(target, from_dir) {
            if let Some(id) = self.by_path.get(&candidate) {
                return Resolution::Resolved(*id);
            }
        }

        // Title matching applies to bare names only, not path-shaped targets.
        if !target.contains('/') {
            let stem = file_stem(target).to_lowercase();
            match self.by_title.get(&stem).map(Vec::as_slice) {
                Some([only]) => return Resolution::Resolved(*only),
                Some(many) if many.len() > 1 => return Resolution::Ambiguous(many.to_vec()),
                _ => {}
            }
        }

        Resolution::Missing
    }
}

fn strip_fragment(target: &str) -> &str {
    target.split_once('#').map(|(p, _)| p).unwrap_or(target)
}

/// Directory of a vault-relative path, `""` for the vault root.
pub fn parent_dir(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Joins `target` onto `base_dir` lexically, resolving `.` and `..`.
pub fn join_relative(base_dir: &str, target: &str) -> String {
    let mut parts: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };
    for component in target.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn path_candidates(target: &str, from_dir: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |p: String| {
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    };

    let has_md = target.to_lowercase().ends_with(".md");
    let relative = join_relative(from_dir, target);
    let rooted = join_relative("", target);

    if has_md {
        push(relative);
        push(rooted);
    } else {
        push(format!("{relative}.md"));
        push(format!("{rooted}.md"));
    }
    out
}
