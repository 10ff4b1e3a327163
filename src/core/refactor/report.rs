use serde::Serialize;

use crate::config::FileKind;
use crate::error::Error;
use crate::occurrence::{OccurrenceEntry, RevisionReport};

/// What the run did with one table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// The guarded step ran and succeeded.
    Executed,
    /// An earlier, interrupted run already completed this step.
    SkippedResumed,
    /// Dry run: the step was counted but not launched.
    Planned,
    /// The document query matched zero or several nodes; nothing changed.
    Ambiguous,
    /// Listed only. Headers and unrecognized files have no step.
    Reported,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub kind: FileKind,
    pub outcome: FileOutcome,
    pub lines: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependent_headers: Vec<String>,
    /// Source file whose step covers this header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Tool command line or document edit description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FileReport {
    pub(crate) fn new(
        path: &str,
        kind: FileKind,
        entry: &OccurrenceEntry,
        outcome: FileOutcome,
    ) -> Self {
        Self {
            path: path.to_string(),
            kind,
            outcome,
            lines: entry.sorted_lines(),
            dependent_headers: entry.dependent_headers.iter().cloned().collect(),
            owner: None,
            command: None,
            step: None,
            message: None,
        }
    }
}

/// Summary of one orchestration run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub term: String,
    pub value: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<u64>,
    pub total_steps: u64,
    pub files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisions: Option<RevisionReport>,
    /// Set when revision harvesting failed after every step had completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisions_error: Option<HarvestFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestFailure {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&Error> for HarvestFailure {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

impl RunReport {
    pub fn count(&self, outcome: FileOutcome) -> usize {
        self.files.iter().filter(|f| f.outcome == outcome).count()
    }

    pub fn file(&self, path: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.path == path)
    }
}
