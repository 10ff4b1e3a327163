use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,
    ValidationInvalidJson,

    SearchServiceError,

    StepFailed,
    ToolFailed,

    ResolveUnresolvedHeader,

    DocumentAmbiguousTarget,
    DocumentInvalid,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::SearchServiceError => "search.service_error",

            ErrorCode::StepFailed => "step.failed",
            ErrorCode::ToolFailed => "tool.failed",

            ErrorCode::ResolveUnresolvedHeader => "resolve.unresolved_header",

            ErrorCode::DocumentAmbiguousTarget => "document.ambiguous_target",
            ErrorCode::DocumentInvalid => "document.invalid",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceErrorDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailedDetails {
    pub step: u64,
    pub label: String,
    pub cause: String,
    pub cause_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedHeaderDetails {
    pub header: String,
    pub visited: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousTargetDetails {
    pub file: String,
    pub query: String,
    pub matches: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInvalidDetails {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let details = to_details(ConfigMissingKeyDetails {
            key: key.clone(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key '{}'", key),
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.clone(),
            value,
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value for '{}': {}", key, problem),
            details,
        )
    }

    /// Non-successful response (or no response at all) from the search index.
    pub fn service_error(
        url: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let reason = reason.into();
        let message = match status {
            Some(code) => format!(
                "Error retrieving grok data for <{}>: {} {}",
                url, code, reason
            ),
            None => format!("Error retrieving grok data for <{}>: {}", url, reason),
        };
        let details = to_details(ServiceErrorDetails {
            url,
            status,
            reason,
        });

        let mut err = Self::new(ErrorCode::SearchServiceError, message, details);
        err.retryable = Some(true);
        err
    }

    /// A guarded step raised. The ledger stamp still names `step`.
    pub fn step_failed(step: u64, label: impl Into<String>, cause: &Error) -> Self {
        let label = label.into();
        let details = to_details(StepFailedDetails {
            step,
            label: label.clone(),
            cause: cause.message.clone(),
            cause_code: cause.code.as_str().to_string(),
        });

        Self::new(
            ErrorCode::StepFailed,
            format!("Step {} ({}) failed: {}", step, label, cause.message),
            details,
        )
        .with_resume_hint(step)
    }

    pub fn tool_failed(details: ToolFailedDetails) -> Self {
        let message = format!(
            "Refactoring tool returned error code {} for <{}>",
            details.exit_code, details.command
        );
        Self::new(ErrorCode::ToolFailed, message, to_details(details))
    }

    pub fn unresolved_header(header: impl Into<String>, visited: Vec<String>) -> Self {
        let header = header.into();
        let details = to_details(UnresolvedHeaderDetails {
            header: header.clone(),
            visited,
        });

        Self::new(
            ErrorCode::ResolveUnresolvedHeader,
            format!("No source file found that includes header <{}>", header),
            details,
        )
        .with_hint("Add an explicit entry for this header under 'headers.map' in the config")
    }

    pub fn ambiguous_target(
        file: impl Into<String>,
        query: impl Into<String>,
        matches: usize,
    ) -> Self {
        let file = file.into();
        let query = query.into();
        let message = format!(
            "Expected exactly one node for <{}> in <{}>, found {}",
            query, file, matches
        );
        let details = to_details(AmbiguousTargetDetails {
            file,
            query,
            matches,
        });

        Self::new(ErrorCode::DocumentAmbiguousTarget, message, details)
    }

    pub fn document_invalid(file: impl Into<String>, error: impl Into<String>) -> Self {
        let file = file.into();
        let error = error.into();
        let message = format!("Cannot edit document <{}>: {}", file, error);
        let details = to_details(DocumentInvalidDetails { file, error });

        Self::new(ErrorCode::DocumentInvalid, message, details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Adds (or overwrites) a single key in the details object.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Tags the error with the step that raised it and tells the user how to replay it.
    pub fn with_resume_hint(self, step: u64) -> Self {
        self.with_detail("step", step).with_hint(format!(
            "The step stamp was kept at step {}. Re-run the same command to resume there",
            step
        ))
    }

    pub fn is_fatal(&self) -> bool {
        self.code != ErrorCode::DocumentAmbiguousTarget
    }
}
