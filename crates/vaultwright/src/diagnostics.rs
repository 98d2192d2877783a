use serde::{Deserialize, Serialize};

/// Non-fatal problem recorded during a run. Warnings are collected, never
/// thrown: preview mode always completes and reports every warning alongside
/// the proposed plan.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    /// Vault-relative path of the note the warning is attached to, when known.
    pub note: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum WarningKind {
    /// A file under the root could not be read; the scan continues without it.
    UnreadableFile,
    /// The metadata block could not be parsed; the note is treated as having
    /// no frontmatter and the block bytes are left untouched.
    MalformedFrontmatter,
    /// A reference's raw target matched no note. Left untouched by rewriting.
    UnresolvedReference,
    /// A title-only reference matched more than one note. Left untouched.
    AmbiguousReference,
    /// A frontmatter value was not coercible to its declared type; the
    /// original value is retained.
    SchemaViolation,
}

impl Warning {
    pub fn new(kind: WarningKind, note: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            note: note.map(str::to_string),
            message: message.into(),
        }
    }
}
