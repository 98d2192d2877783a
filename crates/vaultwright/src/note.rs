use std::ops::Range;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stable per-note handle assigned at scan time, independent of the note's
/// current file path. Renames never invalidate a `NoteId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(pub u32);

/// A Markdown file as read from disk, before parsing.
#[derive(Clone, Debug)]
pub struct RawNote {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Vault-relative path using forward slashes.
    pub rel_path: String,
    pub content: String,
}

/// One Markdown note: raw content plus its parsed frontmatter and references.
///
/// Owned exclusively by the [`crate::graph::VaultGraph`] for the duration of
/// one run. The planner never mutates a note in place; proposed changes are
/// plan values.
#[derive(Clone, Debug)]
pub struct Note {
    pub id: NoteId,
    pub path: PathBuf,
    /// Vault-relative path using forward slashes.
    pub rel_path: String,
    pub content: String,
    /// Byte span of the frontmatter block (including delimiters), if present
    /// and parseable.
    pub frontmatter_span: Option<Range<usize>>,
    /// Order-preserving parsed frontmatter mapping.
    pub frontmatter: Option<serde_yaml::Mapping>,
    /// References in document order; byte spans are non-overlapping and sorted.
    pub references: Vec<Reference>,
}

impl Note {
    /// The note's title: its file stem as written on disk.
    pub fn title(&self) -> &str {
        file_stem(&self.rel_path)
    }
}

/// Returns the final path component without its `.md` extension.
pub fn file_stem(rel_path: &str) -> &str {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    name.strip_suffix(".md")
        .or_else(|| name.strip_suffix(".MD"))
        .unwrap_or(name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// `[[Target]]` or `[[Target|Alias]]`.
    Wikilink,
    /// `[text](target)` with a vault-filesystem destination.
    InlineLink,
}

/// One occurrence of a cross-note link inside a note's content.
#[derive(Clone, Debug)]
pub struct Reference {
    pub kind: ReferenceKind,
    /// Target text exactly as written (a bare title, a relative path, never
    /// the display alias).
    pub raw_target: String,
    /// Display alias of a wikilink, if one was written.
    pub alias: Option<String>,
    /// Byte span of the whole occurrence in the owning note's content.
    pub span: Range<usize>,
    /// Byte span of the target text alone; rewriting replaces exactly these
    /// bytes and preserves every byte outside them verbatim.
    pub target_span: Range<usize>,
    /// Resolved target identity; `None` when ambiguous or missing.
    pub target: Option<NoteId>,
}
