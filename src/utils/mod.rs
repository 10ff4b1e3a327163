//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Process execution with explicit working directories
//! - `io` - File I/O with consistent error handling
//! - `shell` - Quoting for displayed command lines

pub mod command;
pub mod io;
pub mod shell;
