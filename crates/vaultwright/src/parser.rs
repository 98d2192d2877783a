use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::diagnostics::{Warning, WarningKind};
use crate::note::{Note, NoteId, RawNote, Reference, ReferenceKind};

/// Raw pieces of a frontmatter block located in note content.
#[derive(Debug, PartialEq, Eq)]
pub struct FrontmatterBlock<'a> {
    /// Byte span of the whole block, including both `---` delimiter lines.
    pub span: Range<usize>,
    pub yaml: &'a str,
}

/// Locates the YAML frontmatter block at the start of `content`, if any.
///
/// The block must open with `---` on the first line (a UTF-8 BOM is
/// tolerated) and close with a `---` line. Returns `None` when either
/// delimiter is missing; whether the YAML inside parses is the caller's
/// concern.
pub fn locate_frontmatter(content: &str) -> Option<FrontmatterBlock<'_>> {
    let bom = '\u{feff}';
    let start = if content.starts_with(bom) { bom.len_utf8() } else { 0 };
    let rest = &content[start..];

    rest.strip_prefix("---")?;
    let after_open = &content[start + 3..];
    let yaml_start = if after_open.starts_with("\r\n") {
        start + 5
    } else if after_open.starts_with('\n') {
        start + 4
    } else {
        return None;
    };

    let tail = &content[yaml_start..];
    // The closing delimiter must be a whole line; `---extra` is body text.
    let mut search = 0;
    let close = loop {
        let hit = tail[search..].find("\n---")? + search;
        let after = &tail[hit + 4..];
        if after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n") {
            break hit;
        }
        search = hit + 1;
    };
    let yaml = tail[..close].trim_end();

    // Block ends after the closing delimiter and its trailing newline.
    let mut end = yaml_start + close + 4;
    if content[end..].starts_with("\r\n") {
        end += 2;
    } else if content[end..].starts_with('\n') {
        end += 1;
    }

    Some(FrontmatterBlock {
        span: start..end,
        yaml,
    })
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]\|\n]+)(?:\|([^\[\]\n]*))?\]\]").unwrap())
}

fn inline_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(!?)\[([^\]\n]*)\]\(([^()\n]+)\)").unwrap())
}

/// Parses one raw note into its frontmatter and ordered reference list.
///
/// Malformed frontmatter degrades to "no frontmatter" with a warning; the
/// block's bytes are then left untouched by every later stage. Reference
/// byte spans are exact: rewriting depends on them, never on re-searching
/// the content.
pub fn parse_note(id: NoteId, raw: RawNote) -> (Note, Vec<Warning>) {
    let mut warnings = Vec::new();

    let (frontmatter_span, frontmatter) = match locate_frontmatter(&raw.content) {
        Some(block) => match serde_yaml::from_str::<serde_yaml::Mapping>(block.yaml) {
            Ok(mapping) => (Some(block.span), Some(mapping)),
            Err(err) => {
                warnings.push(Warning::new(
                    WarningKind::MalformedFrontmatter,
                    Some(&raw.rel_path),
                    format!("frontmatter is not a valid YAML mapping: {err}"),
                ));
                (Some(block.span), None)
            }
        },
        None => (None, None),
    };

    let body_start = frontmatter_span.as_ref().map(|s| s.end).unwrap_or(0);
    let references = extract_references(&raw.content, body_start);

    let note = Note {
        id,
        path: raw.path,
        rel_path: raw.rel_path,
        content: raw.content,
        frontmatter_span,
        frontmatter,
        references,
    };
    (note, warnings)
}

/// Extracts wikilinks and inline Markdown links from `content[from..]` in one
/// pass, sorted by position. Wikilinks win over an overlapping inline-link
/// match; images and non-filesystem destinations are not vault references.
pub fn extract_references(content: &str, from: usize) -> Vec<Reference> {
    let body = &content[from..];
    let mut refs: Vec<Reference> = Vec::new();

    for caps in wikilink_re().captures_iter(body) {
        let whole = caps.get(0).unwrap();
        let target = caps.get(1).unwrap();
        if target.as_str().starts_with('#') {
            continue; // intra-note heading link, not a cross-note reference
        }
        refs.push(Reference {
            kind: ReferenceKind::Wikilink,
            raw_target: target.as_str().to_string(),
            alias: caps.get(2).map(|m| m.as_str().to_string()),
            span: from + whole.start()..from + whole.end(),
            target_span: from + target.start()..from + target.end(),
            target: None,
        });
    }

    for caps in inline_link_re().captures_iter(body) {
        if !caps.get(1).unwrap().as_str().is_empty() {
            continue; // image
        }
        let dest = caps.get(3).unwrap();
        let (raw_target, target_span) =
            normalize_destination(dest.as_str(), from + dest.start());
        if !is_vault_destination(&raw_target) {
            continue;
        }
        let whole = caps.get(0).unwrap();
        let span = from + whole.start()..from + whole.end();
        if refs.iter().any(|r| spans_overlap(&r.span, &span)) {
            continue;
        }
        refs.push(Reference {
            kind: ReferenceKind::InlineLink,
            raw_target,
            alias: None,
            span,
            target_span,
            target: None,
        });
    }

    refs.sort_by_key(|r| r.span.start);
    refs
}

fn spans_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Normalizes an inline-link destination: trims surrounding whitespace,
/// unwraps an `<...>` destination, and percent-decodes the result. The
/// returned span covers only the text a rewrite replaces, so wrapping and
/// the surrounding bytes survive unchanged.
fn normalize_destination(dest: &str, offset: usize) -> (String, Range<usize>) {
    let mut start = offset + (dest.len() - dest.trim_start().len());
    let mut end = offset + dest.trim_end().len();
    let mut text = dest.trim();
    if let Some(inner) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        start += 1;
        end -= 1;
        text = inner;
    }
    (percent_decode(text), start..end)
}

/// Decodes `%XX` escapes; anything that is not a valid escape, or decodes
/// to invalid UTF-8, is kept as written.
fn percent_decode(dest: &str) -> String {
    if !dest.contains('%') {
        return dest.to_string();
    }
    let bytes = dest.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes[i] == b'%' && i + 2 < bytes.len();
        let pair = escaped.then(|| {
            let hi = (bytes[i + 1] as char).to_digit(16)?;
            let lo = (bytes[i + 2] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        });
        match pair.flatten() {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| dest.to_string())
}

/// True when an inline-link destination points into the vault filesystem
/// rather than at a URL or an intra-document fragment.
fn is_vault_destination(dest: &str) -> bool {
    !(dest.is_empty()
        || dest.starts_with('#')
        || dest.starts_with("mailto:")
        || dest.contains("://"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(content: &str) -> (Note, Vec<Warning>) {
        parse_note(
            NoteId(0),
            RawNote {
                path: PathBuf::from("/vault/a.md"),
                rel_path: "a.md".into(),
                content: content.into(),
            },
        )
    }

    #[test]
    fn locate_frontmatter_reports_exact_block_span() {
        let content = "---\ntitle: A\n---\nBody [[B]]\n";
        let block = locate_frontmatter(content).unwrap();
        assert_eq!(block.yaml, "title: A");
        assert_eq!(&content[block.span.clone()], "---\ntitle: A\n---\n");
    }

    #[test]
    fn locate_frontmatter_tolerates_bom_and_crlf() {
        let content = "\u{feff}---\r\ntitle: A\r\n---\r\nBody\r\n";
        let block = locate_frontmatter(content).unwrap();
        assert_eq!(block.yaml, "title: A");
        assert!(content[block.span.end..].starts_with("Body"));
    }

    #[test]
    fn missing_delimiter_means_no_frontmatter() {
        assert!(locate_frontmatter("# just a heading\n").is_none());
        assert!(locate_frontmatter("---\nnever closed\n").is_none());
    }

    #[test]
    fn malformed_frontmatter_degrades_with_warning() {
        let (note, warnings) = parse("---\n: [unbalanced\n---\nBody\n");
        assert!(note.frontmatter.is_none());
        assert!(note.frontmatter_span.is_some());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MalformedFrontmatter);
    }

    #[test]
    fn wikilink_spans_cover_target_text_exactly() {
        let content = "See [[Meeting Notes (2023)]] today.";
        let refs = extract_references(content, 0);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Wikilink);
        assert_eq!(&content[refs[0].target_span.clone()], "Meeting Notes (2023)");
        assert_eq!(&content[refs[0].span.clone()], "[[Meeting Notes (2023)]]");
        assert!(refs[0].alias.is_none());
    }

    #[test]
    fn wikilink_alias_is_separated_from_target() {
        let content = "[[projects/Roadmap|the roadmap]]";
        let refs = extract_references(content, 0);
        assert_eq!(refs[0].raw_target, "projects/Roadmap");
        assert_eq!(refs[0].alias.as_deref(), Some("the roadmap"));
        assert_eq!(&content[refs[0].target_span.clone()], "projects/Roadmap");
    }

    #[test]
    fn inline_links_skip_urls_images_and_fragments() {
        let content = "[a](note.md) [b](https://example.com) ![img](pic.png) [c](#heading)";
        let refs = extract_references(content, 0);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::InlineLink);
        assert_eq!(refs[0].raw_target, "note.md");
    }

    #[test]
    fn closing_delimiter_with_trailing_text_is_body() {
        assert!(locate_frontmatter("---\ntitle: A\n---extra\n").is_none());
        let content = "---\ntitle: A\n---extra\n---\nBody\n";
        let block = locate_frontmatter(content).unwrap();
        assert_eq!(block.yaml, "title: A\n---extra");
        assert!(content[block.span.end..].starts_with("Body"));
    }

    #[test]
    fn inline_destinations_may_contain_spaces() {
        let content = "[t](Dir Two/Target File.md)";
        let refs = extract_references(content, 0);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::InlineLink);
        assert_eq!(refs[0].raw_target, "Dir Two/Target File.md");
        assert_eq!(&content[refs[0].target_span.clone()], "Dir Two/Target File.md");
    }

    #[test]
    fn angle_wrapped_destination_span_excludes_the_brackets() {
        let content = "[t](<Dir Two/Note.md>)";
        let refs = extract_references(content, 0);
        assert_eq!(refs[0].raw_target, "Dir Two/Note.md");
        assert_eq!(&content[refs[0].target_span.clone()], "Dir Two/Note.md");
    }

    #[test]
    fn percent_encoded_destination_is_decoded_for_resolution() {
        let refs = extract_references("[t](Dir%20Two/Note%2B1.md)", 0);
        assert_eq!(refs[0].raw_target, "Dir Two/Note+1.md");

        // Not a valid escape: kept as written.
        let refs = extract_references("[t](50%_done.md)", 0);
        assert_eq!(refs[0].raw_target, "50%_done.md");
    }

    #[test]
    fn references_are_sorted_and_non_overlapping() {
        let content = "[x](b.md) then [[A]] and [[C|see]]";
        let refs = extract_references(content, 0);
        let targets: Vec<_> = refs.iter().map(|r| r.raw_target.as_str()).collect();
        assert_eq!(targets, vec!["b.md", "A", "C"]);
        for pair in refs.windows(2) {
            assert!(pair[0].span.end <= pair[1].span.start);
        }
    }

    #[test]
    fn frontmatter_block_is_excluded_from_reference_scan() {
        let (note, _) = parse("---\nrelated: \"[[B]]\"\n---\nBody [[C]]\n");
        assert_eq!(note.references.len(), 1);
        assert_eq!(note.references[0].raw_target, "C");
    }
}
