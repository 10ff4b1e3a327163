//! Table-driven refactoring: resolve header owners, then run one guarded
//! step per compiled source or structured document.

mod orchestrator;
mod report;

pub use orchestrator::{Orchestrator, RefactorSpec};
pub use report::{FileOutcome, FileReport, HarvestFailure, RunReport};
