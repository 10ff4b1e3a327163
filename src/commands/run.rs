use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;

use grokrefactor::ledger::StepLedger;
use grokrefactor::occurrence::{OccurrenceEntry, OccurrenceTable};
use grokrefactor::refactor::{Orchestrator, RunReport};
use grokrefactor::search::{IncludeIndex, SearchClient};
use grokrefactor::Error;

use super::{read_json_spec_to_string, require_client, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct RunArgs {
    /// Symbol to refactor
    pub term: String,

    /// Value passed to the refactoring tool as --value
    pub value: String,

    /// Occurrence table instead of an index query: a JSON object of
    /// path -> [lines] (inline, @file, or - for stdin)
    #[arg(long, value_name = "JSON")]
    pub table: Option<String>,

    /// Count and report steps without launching or writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Echo every guarded step before it is considered
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub command: &'static str,
    #[serde(flatten)]
    pub report: RunReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<RunOutput> {
    let mut config = global.load_config()?;
    if args.dry_run {
        config.ledger.execute = false;
    }
    if args.verbose {
        config.ledger.verbose = true;
    }

    let mut ledger = StepLedger::from_config(&config.ledger)?;
    let orchestrator = Orchestrator::from_config(config.clone())?;

    let (report, warnings) = match &args.table {
        Some(spec) => {
            let table = parse_table(&read_json_spec_to_string(spec, "table")?)?;
            let client = (!config.search.url.trim().is_empty())
                .then(|| SearchClient::new(config.search.clone()));
            let index = client.as_ref().map(|c| c as &dyn IncludeIndex);

            let spec = orchestrator.prepare(&args.term, &args.value, table.clone(), index)?;
            let mut report = orchestrator.run(&spec, &mut ledger)?;

            if let (Some(client), true) = (&client, config.report_revisions) {
                orchestrator.attach_revisions(client, &table, &mut report);
            }
            let warnings = client.map(|c| c.take_warnings()).unwrap_or_default();
            (report, warnings)
        }
        None => {
            let client = require_client(&config)?;
            let report =
                orchestrator.run_from_index(&client, &args.term, &args.value, &mut ledger)?;
            (report, client.take_warnings())
        }
    };

    Ok((
        RunOutput {
            command: "run",
            report,
            warnings,
        },
        0,
    ))
}

/// `{"path": [line, ...]}`; an empty list registers the path without lines.
fn parse_table(raw: &str) -> grokrefactor::Result<OccurrenceTable> {
    let parsed: BTreeMap<String, Vec<u32>> = serde_json::from_str(raw).map_err(|e| {
        Error::validation_invalid_json(e, Some("parse occurrence table".to_string()))
    })?;

    if let Some((path, _)) = parsed.iter().find(|(_, lines)| lines.contains(&0)) {
        return Err(Error::validation_invalid_argument(
            "table",
            format!("Line numbers for {} must start at 1", path),
        ));
    }

    Ok(parsed
        .into_iter()
        .map(|(path, lines)| (path, OccurrenceEntry::with_lines(lines)))
        .collect())
}
