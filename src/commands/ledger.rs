use clap::{Args, Subcommand};
use serde::Serialize;

use grokrefactor::ledger::StepLedger;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct LedgerArgs {
    #[command(subcommand)]
    command: LedgerCommand,
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// Show the step an interrupted run will resume from
    Status,
    /// Delete the step stamp so the next run starts from the beginning
    Reset,
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum LedgerOutput {
    #[serde(rename = "ledger.status")]
    Status {
        stamp_file: String,
        interrupted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        resume_from: Option<u64>,
    },
    #[serde(rename = "ledger.reset")]
    Reset { stamp_file: String, removed: bool },
}

pub fn run(args: LedgerArgs, global: &GlobalArgs) -> CmdResult<LedgerOutput> {
    let config = global.load_config()?;
    let ledger = StepLedger::from_config(&config.ledger)?;
    let stamp_file = ledger.stamp_path().display().to_string();

    match args.command {
        LedgerCommand::Status => {
            let stamp = StepLedger::read_stamp(ledger.stamp_path())?;
            Ok((
                LedgerOutput::Status {
                    stamp_file,
                    interrupted: stamp.is_some(),
                    resume_from: stamp.filter(|step| *step > 0),
                },
                0,
            ))
        }
        LedgerCommand::Reset => {
            let removed = StepLedger::reset(ledger.stamp_path())?;
            Ok((LedgerOutput::Reset { stamp_file, removed }, 0))
        }
    }
}
