//! Command execution primitives with consistent error handling.
//!
//! Every call takes an explicit working directory; nothing here changes the
//! process-wide current directory.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    /// Raw stdout; may be a whole replacement file, so kept as bytes.
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub exit_code: i32,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Run `program` with `args` in `cwd` (inherited when `None`) and capture
/// its output. A non-zero exit is not an error here; a failure to launch is.
pub fn run_captured(program: &str, args: &[String], cwd: Option<&Path>) -> Result<CapturedOutput> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command.output().map_err(|e| {
        Error::internal_io(
            format!("Failed to run {}: {}", program, e),
            Some(format!("launch {}", program)),
        )
    })?;

    Ok(CapturedOutput {
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: output.stdout,
    })
}
