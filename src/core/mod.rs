// Public modules
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod ledger;
pub mod occurrence;
pub mod refactor;
pub mod resolver;
pub mod search;
pub mod strategy;
pub mod tool;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use occurrence::{OccurrenceEntry, OccurrenceTable, RevisionRecord};
