pub mod apply;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph;
pub mod naming;
pub mod note;
pub mod parser;
pub mod planner;
pub mod preview;
pub mod scanner;
pub mod schema;

pub use apply::{Applier, ApplyReport, OsFs, VaultFs};
pub use diagnostics::{Warning, WarningKind};
pub use engine::{RunOptions, RunOutcome, run, snapshot};
pub use error::VaultError;
pub use graph::{Resolution, VaultGraph};
pub use naming::{NamingConfig, propose, slugify};
pub use note::{Note, NoteId, RawNote, Reference, ReferenceKind};
pub use parser::{FrontmatterBlock, locate_frontmatter, parse_note};
pub use planner::{Operation, Plan, PlanOptions, SpanEdit, plan};
pub use preview::render as render_plan;
pub use scanner::{ScanOutcome, scan_vault};
pub use schema::{DeriveRule, FieldKind, FieldSpec, FrontmatterSchema, Normalization};
