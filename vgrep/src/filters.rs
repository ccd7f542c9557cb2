//! Path filtering applied by the walker.
//!
//! Both filters are opt-in; with the default configuration every regular file
//! under the root is searched. Ignore patterns use glob syntax and are matched
//! against the path relative to the search root with `/` separators, so
//! `target/**` and `**/*.min.js` mean the same thing on every platform.

use glob::{MatchOptions, Pattern};
use std::path::Path;

use crate::errors::{SearchError, SearchResult};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled extension allow-list and ignore deny-list
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    extensions: Option<Vec<String>>,
    ignore: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(extensions: Option<Vec<String>>, ignore_patterns: &[String]) -> SearchResult<Self> {
        let ignore = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    SearchError::config_error(format!("invalid ignore pattern '{}': {}", p, e))
                })
            })
            .collect::<SearchResult<Vec<_>>>()?;

        let extensions = extensions.map(|exts| {
            exts.into_iter()
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect()
        });

        Ok(Self { extensions, ignore })
    }

    /// Decides whether a file (relative to the root) is searched.
    pub fn include_file(&self, relative: &Path) -> bool {
        has_valid_extension(relative, &self.extensions) && !self.should_ignore(relative)
    }

    pub fn has_ignore_patterns(&self) -> bool {
        !self.ignore.is_empty()
    }

    /// Checks the deny-list; also used to prune whole directories.
    pub fn should_ignore(&self, relative: &Path) -> bool {
        if self.ignore.is_empty() {
            return false;
        }
        let normalized = relative.to_string_lossy().replace('\\', "/");
        self.ignore
            .iter()
            .any(|p| p.matches_with(&normalized, MATCH_OPTIONS))
    }
}

/// Checks if a file should be included in the search based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext))),
    }
}
