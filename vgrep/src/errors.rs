//! Error types for vgrep.
//!
//! Errors fall into three groups. Fatal errors (`InvalidRoot`, `EmptyTerm`,
//! `InvalidPattern`, `ConfigError`, `ThreadPool`) stop a run before any output
//! is produced. `Output` means the listener went away and ends the run early.
//! Everything else is recoverable: the engine turns it into a skip event for
//! the single file that caused it and keeps going.
//!
//! ```rust,ignore
//! match searcher.run(&request, &sink, &cancel) {
//!     Ok(summary) => // summary.files_processed, summary.matched_lines, ...
//!     Err(SearchError::InvalidRoot { path, reason }) => // nothing was scanned
//!     Err(e) => // other fatal error
//! }
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },
    #[error("Search term must not be empty")]
    EmptyTerm,
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Binary file: {0}")]
    BinaryFile(PathBuf),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    #[error("Output error: {0}")]
    Output(#[source] std::io::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SearchError {
    pub fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn binary_file(path: impl Into<PathBuf>) -> Self {
        Self::BinaryFile(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Maps an IO error raised while opening or reading `path`.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// Fatal errors abort the whole run; the rest only skip one entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidRoot { .. }
                | Self::EmptyTerm
                | Self::InvalidPattern(_)
                | Self::ConfigError(_)
                | Self::ThreadPool(_)
        )
    }

    /// Short reason used on skip lines, without the path repeated.
    pub fn reason(&self) -> String {
        match self {
            Self::FileNotFound(_) => "file not found".to_string(),
            Self::PermissionDenied(_) => "permission denied".to_string(),
            Self::BinaryFile(_) => "binary file".to_string(),
            Self::InvalidRoot { reason, .. } => reason.clone(),
            Self::InvalidPattern(msg)
            | Self::ConfigError(msg)
            | Self::ThreadPool(msg) => msg.clone(),
            Self::IoError(e) | Self::Output(e) => e.to_string(),
            Self::EmptyTerm => self.to_string(),
        }
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
