use std::fmt;

use thiserror::Error;

/// High-level error type shared across refactor engine components.
///
/// Per-note and per-reference problems are not errors; they are
/// [`crate::diagnostics::Warning`] values collected in reports. Only
/// whole-vault structural failures surface here.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault root does not exist or cannot be read. Aborts before any work.
    #[error("scan error: {0}")]
    Scan(String),
    /// A naming collision the policy could not resolve, or a stale-snapshot
    /// collision detected at apply time.
    #[error("plan conflict: {0}")]
    PlanConflict(String),
    /// An apply-time failure after staging began. The vault has been rolled
    /// back to its pre-apply state; `operation` identifies the first failing
    /// operation.
    #[error("partial failure at `{operation}`: {reason}")]
    PartialFailure { operation: String, reason: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for VaultError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl VaultError {
    /// Prefixes the error's message with where it happened.
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            VaultError::Scan(msg) => VaultError::Scan(format!("{ctx}: {msg}")),
            VaultError::PlanConflict(msg) => VaultError::PlanConflict(format!("{ctx}: {msg}")),
            VaultError::PartialFailure { operation, reason } => VaultError::PartialFailure {
                operation,
                reason: format!("{ctx}: {reason}"),
            },
            VaultError::Serialization(msg) => VaultError::Serialization(format!("{ctx}: {msg}")),
            VaultError::Io(err) => VaultError::Io(err),
        }
    }
}
