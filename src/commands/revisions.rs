use clap::Args;
use serde::Serialize;

use grokrefactor::occurrence::RevisionReport;

use super::{require_client, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct RevisionsArgs {
    /// Symbol whose matching lines should be traced to revisions
    pub term: String,
}

#[derive(Debug, Serialize)]
pub struct RevisionsOutput {
    pub command: &'static str,
    pub term: String,
    pub total_files: usize,
    #[serde(flatten)]
    pub report: RevisionReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn run(args: RevisionsArgs, global: &GlobalArgs) -> CmdResult<RevisionsOutput> {
    let config = global.load_config()?;
    let client = require_client(&config)?;

    let table = client.find_occurrences(&args.term)?;
    let record = client.find_revisions(&table)?;

    Ok((
        RevisionsOutput {
            command: "revisions",
            term: args.term,
            total_files: table.len(),
            report: RevisionReport::from_record(&record),
            warnings: client.take_warnings(),
        },
        0,
    ))
}
