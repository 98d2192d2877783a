use std::fmt::Write as _;

use serde_yaml::Value;

use crate::graph::VaultGraph;
use crate::planner::{Operation, Plan};

/// Renders a plan as a human-reviewable description. Purely presentational;
/// executes nothing.
pub fn render(plan: &Plan, graph: &VaultGraph) -> String {
    let mut out = String::new();

    if plan.is_empty() {
        out.push_str("nothing to do: the vault already conforms\n");
        return out;
    }

    for op in &plan.operations {
        match op {
            Operation::MoveFile { old, new, .. } => {
                let _ = writeln!(out, "move: {old} -> {new}");
            }
            Operation::RewriteContent { note, path, edits } => {
                let content = &graph.note(*note).content;
                for edit in edits {
                    let line = line_number(content, edit.span.start);
                    let old_text = &content[edit.span.clone()];
                    let _ = writeln!(
                        out,
                        "rewrite: {path}:{line}: {old_text:?} -> {:?}",
                        edit.replacement
                    );
                }
            }
            Operation::WriteFrontmatter {
                note,
                path,
                mapping,
            } => {
                let _ = writeln!(out, "frontmatter: {path}");
                let before = graph.note(*note).frontmatter.clone().unwrap_or_default();
                for (key, new_value) in mapping {
                    let name = key.as_str().unwrap_or("?");
                    match before.get(key) {
                        None => {
                            let _ = writeln!(out, "  + {name}: {}", render_value(new_value));
                        }
                        Some(old_value) if old_value != new_value => {
                            let _ = writeln!(
                                out,
                                "  ~ {name}: {} -> {}",
                                render_value(old_value),
                                render_value(new_value)
                            );
                        }
                        Some(_) => {}
                    }
                }
                for key in before.keys() {
                    if !mapping.contains_key(key) {
                        let _ = writeln!(out, "  - {}", key.as_str().unwrap_or("?"));
                    }
                }
            }
        }
    }

    out
}

fn line_number(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

fn render_value(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| "<unrenderable>".into())
}
