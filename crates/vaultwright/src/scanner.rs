use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::diagnostics::{Warning, WarningKind};
use crate::error::VaultError;
use crate::note::RawNote;

/// Result of scanning a vault root: every readable Markdown file, in
/// deterministic vault-relative path order, plus non-fatal warnings for files
/// that were skipped.
#[derive(Debug)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub notes: Vec<RawNote>,
    pub warnings: Vec<Warning>,
}

/// Walks `root` and reads every `*.md` file into a [`RawNote`].
///
/// Fails with [`VaultError::Scan`] only if the root itself does not exist or
/// is not readable; unreadable individual files are recorded as warnings and
/// skipped. Results are sorted by vault-relative path so downstream collision
/// tie-breaks are reproducible regardless of traversal order.
pub fn scan_vault(root: impl AsRef<Path>) -> Result<ScanOutcome, VaultError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(VaultError::Scan(format!(
            "vault root {} does not exist or is not a directory",
            root.display()
        )));
    }
    let root = fs::canonicalize(root).map_err(|err| {
        VaultError::Scan(err.to_string()).context(format!("cannot canonicalize {}", root.display()))
    })?;

    let mut notes = Vec::new();
    let mut warnings = Vec::new();

    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let shown = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warnings.push(Warning::new(
                    WarningKind::UnreadableFile,
                    None,
                    format!("cannot access {shown}: {err}"),
                ));
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }

        let rel_path = relative_path(&root, entry.path());
        match fs::read(entry.path()) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes).into_owned();
                notes.push(RawNote {
                    path: entry.path().to_path_buf(),
                    rel_path,
                    content,
                });
            }
            Err(err) => {
                debug!(path = %entry.path().display(), %err, "skipping unreadable file");
                warnings.push(Warning::new(
                    WarningKind::UnreadableFile,
                    Some(&rel_path),
                    format!("cannot read file: {err}"),
                ));
            }
        }
    }

    notes.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!(count = notes.len(), root = %root.display(), "vault scan complete");

    Ok(ScanOutcome {
        root,
        notes,
        warnings,
    })
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
