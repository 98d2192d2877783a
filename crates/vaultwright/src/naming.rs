use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::VaultError;
use crate::graph::VaultGraph;
use crate::note::NoteId;

/// Slug rules and collision suffix format for the naming policy.
#[derive(Clone, Debug)]
pub struct NamingConfig {
    /// Separator replacing runs of disallowed characters.
    pub separator: char,
    /// Separator between a colliding stem and its numeric suffix.
    pub suffix_separator: char,
    /// Whether directory components are slugged too, or only file names.
    pub rename_directories: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            separator: '-',
            suffix_separator: '-',
            rename_directories: true,
        }
    }
}

fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9.]+").unwrap())
}

/// Slugs one path component: NFKD-decompose, drop non-ASCII, lowercase,
/// replace every run outside `[a-z0-9.]` with the separator, collapse runs
/// of the separator, trim it from both ends.
///
/// Idempotent: a slug maps to itself.
pub fn slugify(component: &str, config: &NamingConfig) -> String {
    let decomposed: String = component.nfkd().filter(char::is_ascii).collect();
    let lowered = decomposed.to_lowercase();
    let replaced = disallowed_re().replace_all(&lowered, config.separator.to_string().as_str());

    let mut out = String::with_capacity(replaced.len());
    let mut prev_sep = false;
    for ch in replaced.chars() {
        if ch == config.separator {
            if !prev_sep {
                out.push(ch);
            }
            prev_sep = true;
        } else {
            out.push(ch);
            prev_sep = false;
        }
    }
    out.trim_matches(config.separator).to_string()
}

/// Proposes the policy-conforming path for one vault-relative note path.
///
/// Every directory component is slugged (unless `rename_directories` is
/// off), the file stem is slugged, and the `.md` extension is normalized to
/// lowercase. A stem that slugs to nothing becomes `untitled`.
pub fn propose(rel_path: &str, config: &NamingConfig) -> String {
    let mut components: Vec<String> = Vec::new();
    let mut parts = rel_path.split('/').peekable();

    while let Some(part) = parts.next() {
        if parts.peek().is_some() {
            components.push(if config.rename_directories {
                let slug = slugify(part, config);
                if slug.is_empty() { "untitled".into() } else { slug }
            } else {
                part.to_string()
            });
        } else {
            let stem = part
                .strip_suffix(".md")
                .or_else(|| part.strip_suffix(".MD"))
                .unwrap_or(part);
            let mut slug = slugify(stem, config);
            // Dots survive slugging for the sake of versioned stems; a stem
            // reduced to dots alone is as empty as one reduced to nothing.
            if slug.chars().all(|c| c == '.') {
                slug = "untitled".into();
            }
            components.push(format!("{slug}.md"));
        }
    }
    components.join("/")
}

/// Computes the whole-vault candidate-path assignment.
///
/// Total over every note, collision-free, and idempotent: a note already at
/// its conforming path keeps it, and colliding candidates are suffixed
/// `stem`, `stem-1`, `stem-2`... ordered by original relative path.
pub fn assign(
    graph: &VaultGraph,
    config: &NamingConfig,
) -> Result<BTreeMap<NoteId, String>, VaultError> {
    let mut proposals: Vec<(String, NoteId, String)> = graph
        .notes()
        .iter()
        .map(|note| {
            (
                note.rel_path.clone(),
                note.id,
                propose(&note.rel_path, config),
            )
        })
        .collect();
    proposals.sort_by(|a, b| a.0.cmp(&b.0));

    let mut assigned: BTreeMap<NoteId, String> = BTreeMap::new();
    let mut taken: BTreeSet<String> = BTreeSet::new();

    // Conforming notes claim their own paths first, so a no-op rename never
    // loses its name to a sibling moving in.
    for (current, id, candidate) in &proposals {
        if current == candidate {
            taken.insert(candidate.clone());
            assigned.insert(*id, candidate.clone());
        }
    }

    for (current, id, candidate) in &proposals {
        if current == candidate {
            continue;
        }
        let chosen = claim_free_path(candidate, config, &mut taken).ok_or_else(|| {
            VaultError::PlanConflict(format!(
                "cannot find a collision-free path for `{current}` (candidate `{candidate}`)"
            ))
        })?;
        assigned.insert(*id, chosen);
    }

    Ok(assigned)
}

fn claim_free_path(
    candidate: &str,
    config: &NamingConfig,
    taken: &mut BTreeSet<String>,
) -> Option<String> {
    if taken.insert(candidate.to_string()) {
        return Some(candidate.to_string());
    }

    let (dir, name) = match candidate.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, candidate),
    };
    let stem = name.strip_suffix(".md").unwrap_or(name);

    for n in 1..10_000u32 {
        let suffixed_name = format!("{stem}{}{n}.md", config.suffix_separator);
        let suffixed = match dir {
            Some(dir) => format!("{dir}/{suffixed_name}"),
            None => suffixed_name,
        };
        if taken.insert(suffixed.clone()) {
            return Some(suffixed);
        }
    }
    None
}
