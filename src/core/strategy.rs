//! Injectable strategies used while dispatching files.
//!
//! Each trait has a config-driven implementation and a blanket impl for
//! plain functions, so embedders can pass closures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{CompilerArgsConfig, PathsConfig};
use crate::error::Result;
use crate::paths;

/// Maps an index path (as reported by the search service) to a local path.
pub trait PathTranslator {
    fn translate(&self, index_path: &str) -> PathBuf;
}

impl<F> PathTranslator for F
where
    F: Fn(&str) -> PathBuf,
{
    fn translate(&self, index_path: &str) -> PathBuf {
        self(index_path)
    }
}

/// Per-file compiler flags appended after the base flags.
pub trait CompilerFlags {
    fn flags(&self, local_path: &Path) -> Vec<String>;
}

impl<F> CompilerFlags for F
where
    F: Fn(&Path) -> Vec<String>,
{
    fn flags(&self, local_path: &Path) -> Vec<String> {
        self(local_path)
    }
}

/// Authoritative header -> owning source lookup. `None` defers to the index.
pub trait HeaderMapping {
    fn source_for(&self, header: &str) -> Option<String>;
}

impl<F> HeaderMapping for F
where
    F: Fn(&str) -> Option<String>,
{
    fn source_for(&self, header: &str) -> Option<String> {
        self(header)
    }
}

/// Strips a fixed prefix from index paths and joins the rest under a root.
#[derive(Debug, Clone)]
pub struct PrefixTranslator {
    strip_prefix: String,
    root: PathBuf,
}

impl PrefixTranslator {
    pub fn new(strip_prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            root: root.into(),
        }
    }

    /// Translators for reading sources and for saving output.
    pub fn from_config(config: &PathsConfig) -> Result<(Self, Self)> {
        let source_root = paths::expand(&config.source_root, "paths.sourceRoot")?;
        let save_root = match &config.save_root {
            Some(raw) => paths::expand(raw, "paths.saveRoot")?,
            None => source_root.clone(),
        };

        Ok((
            Self::new(config.strip_prefix.clone(), source_root),
            Self::new(config.strip_prefix.clone(), save_root),
        ))
    }
}

impl PathTranslator for PrefixTranslator {
    fn translate(&self, index_path: &str) -> PathBuf {
        let relative = index_path
            .strip_prefix(self.strip_prefix.as_str())
            .unwrap_or(index_path);
        paths::join_under(&self.root, relative)
    }
}

/// Flags from config: a per-file override, else the default list.
#[derive(Debug, Clone)]
pub struct ConfiguredFlags {
    default: Vec<String>,
    per_file: BTreeMap<String, Vec<String>>,
}

impl ConfiguredFlags {
    pub fn from_config(config: &CompilerArgsConfig) -> Self {
        Self {
            default: config.default.clone(),
            per_file: config.per_file.clone(),
        }
    }
}

impl CompilerFlags for ConfiguredFlags {
    fn flags(&self, local_path: &Path) -> Vec<String> {
        let key = local_path.to_string_lossy();
        self.per_file
            .get(key.as_ref())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Explicit header -> source table from config.
#[derive(Debug, Clone, Default)]
pub struct MappedHeaders {
    map: BTreeMap<String, String>,
}

impl MappedHeaders {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self { map }
    }
}

impl HeaderMapping for MappedHeaders {
    fn source_for(&self, header: &str) -> Option<String> {
        self.map.get(header).cloned()
    }
}
