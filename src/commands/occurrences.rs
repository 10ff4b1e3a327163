use clap::Args;
use serde::Serialize;

use grokrefactor::occurrence::OccurrenceReport;

use super::{require_client, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct OccurrencesArgs {
    /// Symbol to search the index for
    pub term: String,
}

#[derive(Debug, Serialize)]
pub struct OccurrencesOutput {
    pub command: &'static str,
    pub term: String,
    #[serde(flatten)]
    pub report: OccurrenceReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn run(args: OccurrencesArgs, global: &GlobalArgs) -> CmdResult<OccurrencesOutput> {
    let config = global.load_config()?;
    let client = require_client(&config)?;

    let table = client.find_occurrences(&args.term)?;

    Ok((
        OccurrencesOutput {
            command: "occurrences",
            term: args.term,
            report: OccurrenceReport::from_table(&table),
            warnings: client.take_warnings(),
        },
        0,
    ))
}
