//! JSON envelope and exit codes.
//!
//! Every command prints one envelope on stdout; progress goes to stderr.

use std::io::{self, Write};

use grokrefactor::error::Hint;
use grokrefactor::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody<'a>>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    details: &'a Value,
    #[serde(skip_serializing_if = "<[Hint]>::is_empty")]
    hints: &'a [Hint],
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl<'a> Envelope<'a> {
    fn from_result(result: &'a Result<Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    code: err.code.as_str(),
                    message: &err.message,
                    details: &err.details,
                    hints: &err.hints,
                    retryable: err.retryable,
                }),
            },
        }
    }
}

/// Serializes a command's output and picks the process exit code.
pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(e) => (
                Err(Error::internal_json(e.to_string(), Some("serialize output".to_string()))),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::ValidationInvalidJson => 2,

        ErrorCode::StepFailed | ErrorCode::ToolFailed | ErrorCode::DocumentInvalid => 20,

        ErrorCode::SearchServiceError => 30,

        ErrorCode::ResolveUnresolvedHeader => 31,

        // Only escapes a run when a caller raises it directly.
        ErrorCode::DocumentAmbiguousTarget => 3,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

/// Prints the envelope. A closed stdout (`| head`) is not an error.
pub fn print_json_result(result: Result<Value>) -> Result<()> {
    let payload = serde_json::to_string_pretty(&Envelope::from_result(&result))
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize output".to_string())))?;

    match writeln!(io::stdout().lock(), "{}", payload) {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => {
            Err(Error::internal_io(e.to_string(), Some("write stdout".to_string())))
        }
        _ => Ok(()),
    }
}
