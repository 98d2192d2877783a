use std::path::Path;

use tracing::info;

use crate::apply::{Applier, ApplyReport};
use crate::diagnostics::Warning;
use crate::error::VaultError;
use crate::graph::VaultGraph;
use crate::parser::parse_note;
use crate::planner::{Plan, PlanOptions, plan};
use crate::preview::render;
use crate::scanner::scan_vault;

/// Options for one engine run. Dry-run is the default; the applier only
/// ever executes on explicit opt-in.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub apply: bool,
    pub plan: PlanOptions,
}

/// Terminal result of a run. Warnings are collected along the way and
/// reported here, never thrown.
#[derive(Debug)]
pub enum RunOutcome {
    /// The plan was empty: the vault already conforms.
    NoOp { warnings: Vec<Warning> },
    Preview {
        plan: Plan,
        rendered: String,
        warnings: Vec<Warning>,
    },
    Applied {
        report: ApplyReport,
        warnings: Vec<Warning>,
    },
}

/// Builds one consistent in-memory snapshot of the vault: scan, parse, and
/// graph construction. Nothing is persisted; every run recomputes from disk.
pub fn snapshot(root: impl AsRef<Path>) -> Result<(VaultGraph, Vec<Warning>), VaultError> {
    let scan = scan_vault(root)?;
    let mut warnings = scan.warnings;

    let mut notes = Vec::with_capacity(scan.notes.len());
    for (idx, raw) in scan.notes.into_iter().enumerate() {
        let (note, note_warnings) = parse_note(crate::note::NoteId(idx as u32), raw);
        warnings.extend(note_warnings);
        notes.push(note);
    }

    let (graph, resolve_warnings) = VaultGraph::build(scan.root, notes);
    warnings.extend(resolve_warnings);
    Ok((graph, warnings))
}

/// One full refactor run over a single snapshot: scan, parse, plan, then
/// preview or apply.
pub fn run(root: impl AsRef<Path>, options: &RunOptions) -> Result<RunOutcome, VaultError> {
    let (graph, mut warnings) = snapshot(root)?;

    let plan = plan(&graph, &options.plan)?;
    warnings.extend(plan.warnings.iter().cloned());

    if plan.is_empty() {
        info!("empty plan; vault already conforms");
        return Ok(RunOutcome::NoOp { warnings });
    }

    if !options.apply {
        let rendered = render(&plan, &graph);
        return Ok(RunOutcome::Preview {
            plan,
            rendered,
            warnings,
        });
    }

    let report = Applier::new().apply(&plan, &graph)?;
    info!(
        moved = report.files_moved,
        rewritten = report.files_rewritten,
        "refactor applied"
    );
    Ok(RunOutcome::Applied { report, warnings })
}
