//! Occurrence and revision data harvested from the search index.
//!
//! Paths are kept exactly as the index reports them. Translation to local
//! filesystem paths happens later, at dispatch time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Everything known about one path in an [`OccurrenceTable`].
///
/// `lines` are the 1-indexed lines where the term matched. `dependent_headers`
/// lists headers whose occurrences were re-attributed to this (source) file.
/// An entry with both sets empty is "known but unconfirmed" and is still
/// processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceEntry {
    #[serde(default)]
    pub lines: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependent_headers: BTreeSet<String>,
}

impl OccurrenceEntry {
    pub fn with_lines(lines: impl IntoIterator<Item = u32>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
            dependent_headers: BTreeSet::new(),
        }
    }

    pub fn sorted_lines(&self) -> Vec<u32> {
        self.lines.iter().copied().collect()
    }
}

/// Path -> occurrences. Iteration is always lexicographic by path, which is
/// what makes the guarded step sequence reproducible between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceTable {
    entries: BTreeMap<String, OccurrenceEntry>,
}

impl OccurrenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a term match. Duplicate lines collapse.
    pub fn add_line(&mut self, path: impl Into<String>, line: u32) {
        self.entries.entry(path.into()).or_default().lines.insert(line);
    }

    /// Registers a path with no confirmed line (synthetic caller entry).
    pub fn add_path(&mut self, path: impl Into<String>) {
        self.entries.entry(path.into()).or_default();
    }

    /// Folds a header occurrence into the source file that owns it.
    pub fn attach_header(&mut self, source: impl Into<String>, header: impl Into<String>) {
        self.entries
            .entry(source.into())
            .or_default()
            .dependent_headers
            .insert(header.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&OccurrenceEntry> {
        self.entries.get(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OccurrenceEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of distinct `(path, line)` pairs.
    pub fn occurrence_count(&self) -> usize {
        self.entries.values().map(|e| e.lines.len()).sum()
    }
}

impl FromIterator<(String, OccurrenceEntry)> for OccurrenceTable {
    fn from_iter<I: IntoIterator<Item = (String, OccurrenceEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Revision id -> normalized commit comment. First comment seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionRecord {
    revisions: BTreeMap<String, String>,
}

impl RevisionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `comment` under `revision` unless that revision was already seen.
    /// Returns true when the record changed.
    pub fn record(&mut self, revision: impl Into<String>, raw_comment: &str) -> bool {
        let revision = revision.into();
        if self.revisions.contains_key(&revision) {
            return false;
        }
        self.revisions
            .insert(revision, normalize_comment(raw_comment));
        true
    }

    pub fn get(&self, revision: &str) -> Option<&str> {
        self.revisions.get(revision).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.revisions.iter()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

fn markup_break() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break pattern"))
}

/// Line feeds collapse to spaces, then markup breaks become newlines.
pub fn normalize_comment(raw: &str) -> String {
    let flattened = raw.replace('\n', " ");
    markup_break().replace_all(&flattened, "\n").into_owned()
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceReport {
    pub total_files: usize,
    pub total_occurrences: usize,
    pub files: Vec<FileOccurrences>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOccurrences {
    pub path: String,
    pub lines: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependent_headers: Vec<String>,
}

impl OccurrenceReport {
    pub fn from_table(table: &OccurrenceTable) -> Self {
        let files = table
            .iter()
            .map(|(path, entry)| FileOccurrences {
                path: path.clone(),
                lines: entry.sorted_lines(),
                dependent_headers: entry.dependent_headers.iter().cloned().collect(),
            })
            .collect();

        Self {
            total_files: table.len(),
            total_occurrences: table.occurrence_count(),
            files,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionReport {
    pub total_revisions: usize,
    pub revisions: Vec<RevisionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevisionSummary {
    pub revision: String,
    pub comment: String,
}

impl RevisionReport {
    pub fn from_record(record: &RevisionRecord) -> Self {
        Self {
            total_revisions: record.len(),
            revisions: record
                .iter()
                .map(|(rev, comment)| RevisionSummary {
                    revision: rev.clone(),
                    comment: comment.clone(),
                })
                .collect(),
        }
    }
}
