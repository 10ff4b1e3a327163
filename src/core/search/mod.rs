//! Occurrence and revision harvesting against an OpenGrok-style index.
//!
//! Callers only ever see [`OccurrenceTable`] and [`RevisionRecord`]; markup
//! stays inside this module.

mod annotate;
mod listing;

pub use annotate::{
    parse_annotated, AnnotatedLines, NextSiblingLabel, RevisionLabel, RevisionLocator,
};
pub use listing::{parse_listing, split_target, ListingHit};

use std::cell::RefCell;

use crate::config::{ErrorPolicy, SearchConfig};
use crate::error::{Error, Result};
use crate::http::{ReqwestTransport, Transport};
use crate::occurrence::{OccurrenceTable, RevisionRecord};

/// Source of "which files include this header" answers, used by header
/// resolution. The search client is the production implementation.
pub trait IncludeIndex {
    /// Index paths of files containing an inclusion directive for `basename`.
    fn includers(&self, basename: &str) -> Result<Vec<String>>;
}

pub struct SearchClient<T: Transport = ReqwestTransport> {
    config: SearchConfig,
    transport: T,
    locator: Box<dyn RevisionLocator>,
    warnings: RefCell<Vec<String>>,
}

impl SearchClient<ReqwestTransport> {
    pub fn new(config: SearchConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: Transport> SearchClient<T> {
    pub fn with_transport(config: SearchConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            locator: Box::new(NextSiblingLabel),
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Replaces how revision labels are found relative to line anchors.
    pub fn with_locator(mut self, locator: impl RevisionLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Drains warnings collected under the `print` policy.
    pub fn take_warnings(&self) -> Vec<String> {
        self.warnings.borrow_mut().drain(..).collect()
    }

    fn search_url(&self) -> String {
        let base = self.config.url.trim_end_matches('/');
        if self.config.domain.is_empty() {
            format!("{}/search", base)
        } else {
            format!("{}/{}/search", base, self.config.domain.trim_matches('/'))
        }
    }

    /// Index paths from a caller-supplied table may lack the leading slash.
    fn annotated_url(&self, index_path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            index_path.trim_start_matches('/')
        )
    }

    /// Every occurrence of `term`, keyed by index path.
    pub fn find_occurrences(&self, term: &str) -> Result<OccurrenceTable> {
        let table = self.find_matches(term, term)?;
        log_status!(
            "search",
            "Found {} occurrence(s) of '{}' in {} file(s)",
            table.occurrence_count(),
            term,
            table.len()
        );
        Ok(table)
    }

    /// Runs `query` and keeps the entries whose highlighted text is `highlighted`.
    pub fn find_matches(&self, query: &str, highlighted: &str) -> Result<OccurrenceTable> {
        let url = self.search_url();
        let params = [
            ("q", query.to_string()),
            ("project", self.config.project.clone()),
            ("defs", String::new()),
            ("path", self.config.path.clone()),
            ("hist", String::new()),
            ("n", self.config.max_results.to_string()),
        ];

        let mut table = OccurrenceTable::new();
        let response = match self
            .transport
            .get(&url, &params)
            .and_then(|r| r.into_success())
        {
            Ok(response) => response,
            Err(err) => {
                self.apply_policy(err)?;
                return Ok(table);
            }
        };

        for hit in parse_listing(&response.body, highlighted)? {
            table.add_line(hit.path, hit.line);
        }
        Ok(table)
    }

    /// Revision ids and comments for every line in `table`.
    ///
    /// A file whose annotated view cannot be fetched follows the error
    /// policy: `raise` aborts the harvest, otherwise the file is skipped.
    /// Lines without a revision label are skipped with a warning.
    pub fn find_revisions(&self, table: &OccurrenceTable) -> Result<RevisionRecord> {
        let mut record = RevisionRecord::new();

        for (path, entry) in table.iter() {
            if entry.lines.is_empty() {
                continue;
            }

            let url = self.annotated_url(path);
            let response = match self
                .transport
                .get(&url, &[("a", "true".to_string())])
                .and_then(|r| r.into_success())
            {
                Ok(response) => response,
                Err(err) => {
                    self.apply_policy(err)?;
                    continue;
                }
            };

            let parsed = parse_annotated(&response.body, &entry.lines, self.locator.as_ref())?;
            for (_, label) in parsed.labels {
                record.record(label.revision, &label.comment);
            }
            if !parsed.missing.is_empty() {
                self.warn(format!(
                    "No revision label for line(s) {:?} in <{}>",
                    parsed.missing, path
                ));
            }
        }

        log_status!("revisions", "Collected {} revision(s)", record.len());
        Ok(record)
    }

    fn apply_policy(&self, err: Error) -> Result<()> {
        match self.config.errors {
            ErrorPolicy::Ignore => Ok(()),
            ErrorPolicy::Print => {
                self.warn(err.message);
                Ok(())
            }
            ErrorPolicy::Raise => Err(err),
        }
    }

    fn warn(&self, message: String) {
        if self.config.errors == ErrorPolicy::Ignore {
            return;
        }
        log_status!("search", "{}", message);
        self.warnings.borrow_mut().push(message);
    }
}

impl<T: Transport> IncludeIndex for SearchClient<T> {
    fn includers(&self, basename: &str) -> Result<Vec<String>> {
        let query = self.config.include_query_for(basename);
        Ok(self.find_matches(&query, basename)?.paths())
    }
}
