//! Data model shared by the engine and its listeners.
//!
//! A run is described by an immutable [`SearchRequest`]. While it runs the
//! engine produces a stream of [`SearchEvent`]s:
//!
//! * [`MatchEvent`] for every line that contains the term, emitted as soon as
//!   the line is read. Lines of one file arrive in ascending order; there is
//!   no ordering between files.
//! * [`ProgressSnapshot`] at the configured cadence. `files_processed` only
//!   grows, and exactly one snapshot with `is_final` set closes the stream of
//!   a run that was not cancelled.
//! * [`SkipEvent`] for each file or directory that could not be scanned.
//!
//! When the run returns, a [`SearchSummary`] carries the totals.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};

/// What to search and where. Created once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    root_directory: PathBuf,
    term: String,
}

impl SearchRequest {
    /// Creates a request; the term must be non-empty.
    pub fn new(root_directory: impl AsRef<Path>, term: impl Into<String>) -> SearchResult<Self> {
        let term = term.into();
        if term.is_empty() {
            return Err(SearchError::EmptyTerm);
        }
        Ok(Self {
            root_directory: root_directory.as_ref().to_path_buf(),
            term,
        })
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn term(&self) -> &str {
        &self.term
    }
}

/// One file waiting to be scanned. Moved from the walker to a single worker.
#[derive(Debug, PartialEq, Eq)]
pub struct FileTask {
    pub path: PathBuf,
}

/// A line containing the search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub file_path: PathBuf,
    /// 1-based
    pub line_number: usize,
    /// The line without its terminator
    pub line_content: String,
}

/// Files processed versus files discovered so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub files_processed: usize,
    pub files_total: usize,
    /// Set only on the closing snapshot of a completed run
    pub is_final: bool,
}

/// A file or directory that was passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipEvent {
    pub path: PathBuf,
    pub reason: String,
}

impl SkipEvent {
    pub fn from_error(path: impl Into<PathBuf>, err: &SearchError) -> Self {
        Self {
            path: path.into(),
            reason: err.reason(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Match(MatchEvent),
    Progress(ProgressSnapshot),
    Skipped(SkipEvent),
}

impl SearchEvent {
    /// True for the snapshot that ends a completed run.
    pub fn is_final(&self) -> bool {
        matches!(self, SearchEvent::Progress(p) if p.is_final)
    }
}

impl fmt::Display for MatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file_path.display(),
            self.line_number,
            self.line_content
        )
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processed {}/{}", self.files_processed, self.files_total)
    }
}

impl fmt::Display for SkipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    pub files_total: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub matched_lines: usize,
    pub bytes_scanned: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}
