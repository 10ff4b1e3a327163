use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{ledger, occurrences, revisions, run, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "grokrefactor")]
#[command(version = VERSION)]
#[command(about = "Index-driven bulk refactoring with resumable steps")]
struct Cli {
    /// Config file (default: ./grokrefactor.json, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every file and line where a term occurs
    Occurrences(occurrences::OccurrencesArgs),
    /// Collect revision ids and comments for the lines where a term occurs
    Revisions(revisions::RevisionsArgs),
    /// Refactor every occurrence of a term with the external tool
    Run(run::RunArgs),
    /// Inspect or clear the resumable step stamp
    Ledger(ledger::LedgerArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs { config: cli.config };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
