//! Run configuration loaded from `grokrefactor.json`.
//!
//! Every recognized option is a typed field with a built-in default; unknown
//! keys are rejected so a typo never silently falls back to a default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;

/// Placeholder substituted with the search term in document queries.
pub const TERM_PLACEHOLDER: &str = "{term}";
/// Placeholder substituted with a header's file name in include queries.
pub const BASENAME_PLACEHOLDER: &str = "{basename}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefactorConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub extensions: ExtensionsConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub headers: HeadersConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default = "default_true")]
    pub report_revisions: bool,
}

/// What to do when the search index answers with a non-successful response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Suppress the failure entirely.
    Ignore,
    /// Report the failure and keep going.
    #[default]
    Print,
    /// Abort with the error.
    Raise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub errors: ErrorPolicy,
    #[serde(default = "default_include_query")]
    pub include_query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default = "default_tool_command")]
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub compiler_args_base: Vec<String>,
    #[serde(default)]
    pub compiler_args: CompilerArgsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompilerArgsConfig {
    #[serde(default = "default_compiler_args")]
    pub default: Vec<String>,
    /// Local path -> flags, replacing `default` for that file.
    #[serde(default)]
    pub per_file: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PathsConfig {
    /// Prefix removed from index paths before joining under the roots.
    #[serde(default)]
    pub strip_prefix: String,
    #[serde(default)]
    pub source_root: String,
    /// Where refactored output is written; defaults to `source_root`.
    #[serde(default)]
    pub save_root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtensionsConfig {
    #[serde(default = "default_compiled_extensions")]
    pub compiled: Vec<String>,
    #[serde(default = "default_header_extensions")]
    pub headers: Vec<String>,
    #[serde(default = "default_document_extensions")]
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentConfig {
    #[serde(default)]
    pub query_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeadersConfig {
    /// Header index path -> owning source index path.
    #[serde(default)]
    pub map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LedgerConfig {
    #[serde(default = "default_stamp_file")]
    pub stamp_file: String,
    #[serde(default = "default_true")]
    pub execute: bool,
    #[serde(default)]
    pub verbose: bool,
}

/// File classification used at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Compiled,
    Header,
    Document,
    Other,
}

impl ExtensionsConfig {
    pub fn classify(&self, path: &str) -> FileKind {
        if has_extension(path, &self.compiled) {
            FileKind::Compiled
        } else if has_extension(path, &self.headers) {
            FileKind::Header
        } else if has_extension(path, &self.documents) {
            FileKind::Document
        } else {
            FileKind::Other
        }
    }

    pub fn is_header(&self, path: &str) -> bool {
        has_extension(path, &self.headers)
    }

    pub fn is_compiled(&self, path: &str) -> bool {
        has_extension(path, &self.compiled)
    }
}

fn has_extension(path: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

impl DocumentConfig {
    /// Path query for `term`, if document edits are configured.
    pub fn query_for(&self, term: &str) -> Option<String> {
        self.query_template
            .as_ref()
            .map(|template| template.replace(TERM_PLACEHOLDER, term))
    }
}

impl SearchConfig {
    pub fn include_query_for(&self, basename: &str) -> String {
        self.include_query.replace(BASENAME_PLACEHOLDER, basename)
    }
}

// =============================================================================
// Defaults
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_max_results() -> u32 {
    100
}

fn default_include_query() -> String {
    "\"#include {basename}\"".to_string()
}

fn default_tool_command() -> String {
    "./simpleRefactor".to_string()
}

fn default_compiler_args() -> Vec<String> {
    vec!["-I.".to_string()]
}

fn default_compiled_extensions() -> Vec<String> {
    [".cpp", ".cc", ".cxx", ".c"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_header_extensions() -> Vec<String> {
    [".h", ".hh", ".hpp", ".hxx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_document_extensions() -> Vec<String> {
    vec![".xml".to_string()]
}

fn default_stamp_file() -> String {
    "step.txt".to_string()
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            tool: ToolConfig::default(),
            paths: PathsConfig::default(),
            extensions: ExtensionsConfig::default(),
            document: DocumentConfig::default(),
            headers: HeadersConfig::default(),
            ledger: LedgerConfig::default(),
            report_revisions: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            domain: String::new(),
            project: String::new(),
            path: String::new(),
            max_results: default_max_results(),
            errors: ErrorPolicy::default(),
            include_query: default_include_query(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: default_tool_command(),
            working_dir: None,
            compiler_args_base: Vec::new(),
            compiler_args: CompilerArgsConfig::default(),
        }
    }
}

impl Default for CompilerArgsConfig {
    fn default() -> Self {
        Self {
            default: default_compiler_args(),
            per_file: BTreeMap::new(),
        }
    }
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            compiled: default_compiled_extensions(),
            headers: default_header_extensions(),
            documents: default_document_extensions(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            stamp_file: default_stamp_file(),
            execute: true,
            verbose: false,
        }
    }
}

// =============================================================================
// Loading and validation
// =============================================================================

impl RefactorConfig {
    /// Parses and validates a config document.
    pub fn from_json(content: &str, origin: &str) -> Result<Self> {
        let config: RefactorConfig = serde_json::from_str(content)
            .map_err(|e| Error::config_invalid_json(origin, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`; a missing file yields built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;

        Self::from_json(&content, &path.display().to_string())
    }

    /// Loads the file `--config` names, else `./grokrefactor.json`, else the
    /// user-level file. Only an explicit path must exist.
    pub fn discover(explicit: Option<&str>) -> Result<(Self, PathBuf)> {
        let path = paths::config_file(explicit)?;
        if explicit.is_some() && !path.exists() {
            return Err(Error::validation_invalid_argument(
                "config",
                format!("Config file {} does not exist", path.display()),
            ));
        }

        let config = Self::load(&path)?;
        Ok((config, path))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(template) = &self.document.query_template {
            if !template.contains(TERM_PLACEHOLDER) {
                return Err(Error::config_invalid_value(
                    "document.queryTemplate",
                    Some(template.clone()),
                    format!("must contain the {} placeholder", TERM_PLACEHOLDER),
                ));
            }
        }

        if !self.search.include_query.contains(BASENAME_PLACEHOLDER) {
            return Err(Error::config_invalid_value(
                "search.includeQuery",
                Some(self.search.include_query.clone()),
                format!("must contain the {} placeholder", BASENAME_PLACEHOLDER),
            ));
        }

        if self.search.max_results == 0 {
            return Err(Error::config_invalid_value(
                "search.maxResults",
                Some("0".to_string()),
                "must be at least 1",
            ));
        }

        if self.tool.command.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "tool.command",
                None,
                "must name the refactoring binary",
            ));
        }

        if self.ledger.stamp_file.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "ledger.stampFile",
                None,
                "must not be empty",
            ));
        }

        Ok(())
    }

    /// Search settings, failing when the index URL was never configured.
    pub fn require_search(&self) -> Result<&SearchConfig> {
        if self.search.url.trim().is_empty() {
            return Err(Error::config_missing_key("search.url", None)
                .with_hint("Set 'search.url' to the OpenGrok base URL in grokrefactor.json"));
        }
        Ok(&self.search)
    }
}
