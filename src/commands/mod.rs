use std::io::Read;
use std::path::Path;

use grokrefactor::config::RefactorConfig;
use grokrefactor::search::SearchClient;

pub type CmdResult<T> = grokrefactor::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    /// Explicit `--config` path.
    pub config: Option<String>,
}

impl GlobalArgs {
    pub(crate) fn load_config(&self) -> grokrefactor::Result<RefactorConfig> {
        let (config, _) = RefactorConfig::discover(self.config.as_deref())?;
        Ok(config)
    }
}

/// Search client for commands that cannot work without the index.
pub(crate) fn require_client(config: &RefactorConfig) -> grokrefactor::Result<SearchClient> {
    Ok(SearchClient::new(config.require_search()?.clone()))
}

/// Reads a JSON argument given inline, as `@file`, or as `-` for stdin.
pub(crate) fn read_json_spec_to_string(spec: &str, field: &str) -> grokrefactor::Result<String> {
    use std::io::IsTerminal;

    if spec.trim() == "-" {
        let mut buf = String::new();
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(grokrefactor::Error::validation_invalid_argument(
                field,
                "Cannot read JSON from stdin when stdin is a TTY",
            ));
        }
        stdin.read_to_string(&mut buf).map_err(|e| {
            grokrefactor::Error::internal_io(e.to_string(), Some("read stdin".to_string()))
        })?;
        return Ok(buf);
    }

    if let Some(path) = spec.strip_prefix('@') {
        if path.trim().is_empty() {
            return Err(grokrefactor::Error::validation_invalid_argument(
                field,
                "Invalid JSON spec '@' (missing file path)",
            ));
        }
        return grokrefactor::utils::io::read_file(Path::new(path), "read JSON spec");
    }

    Ok(spec.to_string())
}

pub mod ledger;
pub mod occurrences;
pub mod revisions;
pub mod run;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (grokrefactor::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Occurrences(args) => dispatch!(args, global, occurrences),
        crate::Commands::Revisions(args) => dispatch!(args, global, revisions),
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Ledger(args) => dispatch!(args, global, ledger),
    }
}
