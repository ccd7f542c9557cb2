use ignore::{DirEntry, Walk, WalkBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::SearchConfig;
use crate::errors::{SearchError, SearchResult};
use crate::events::{FileTask, SkipEvent};
use crate::filters::PathFilter;

/// One step of a walk: a file to scan or something that was passed over.
#[derive(Debug, PartialEq, Eq)]
pub enum WalkItem {
    File(FileTask),
    Skipped(SkipEvent),
}

/// Enumerates regular files under a root directory.
///
/// Siblings are visited in lexicographic order, so a walk over an unmodified
/// tree always yields the same sequence. Each call to [`Walker::iter`] starts
/// a fresh, lazy walk.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    filter: PathFilter,
    follow_links: bool,
    respect_ignore_files: bool,
}

impl Walker {
    /// Validates `root` and prepares a walker over it.
    ///
    /// This is the only fatal check of a run: a missing root or one that is
    /// not a directory fails here, before anything is scanned.
    pub fn new(root: &Path, config: &SearchConfig) -> SearchResult<Self> {
        let root = validate_root(root)?;
        let filter = PathFilter::new(config.file_extensions.clone(), &config.ignore_patterns)?;
        Ok(Self {
            root,
            filter,
            follow_links: config.follow_links,
            respect_ignore_files: config.respect_ignore_files,
        })
    }

    /// The canonical root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn iter(&self) -> WalkIter {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(self.respect_ignore_files)
            .require_git(false)
            .follow_links(self.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b));

        if self.filter.has_ignore_patterns() {
            let root = self.root.clone();
            let filter = self.filter.clone();
            builder.filter_entry(move |entry| {
                entry.depth() == 0 || !filter.should_ignore(relative_to(&root, entry.path()))
            });
        }

        WalkIter {
            inner: builder.build(),
            root: self.root.clone(),
            filter: self.filter.clone(),
            visited: self.follow_links.then(HashSet::new),
        }
    }
}

/// Lazy iterator returned by [`Walker::iter`]
pub struct WalkIter {
    inner: Walk,
    root: PathBuf,
    filter: PathFilter,
    // Canonical paths already yielded; only tracked when links are followed.
    visited: Option<HashSet<PathBuf>>,
}

impl WalkIter {
    fn accept(&mut self, entry: DirEntry) -> Option<WalkItem> {
        // Links to files are searched even when links are not followed;
        // links to directories are never descended into in that case.
        let is_file = match entry.file_type() {
            Some(ft) if ft.is_file() => true,
            Some(_) if entry.path_is_symlink() => {
                fs::metadata(entry.path()).is_ok_and(|m| m.is_file())
            }
            _ => false,
        };
        if !is_file {
            if entry.path_is_symlink() {
                trace!("Not a link to a regular file: {}", entry.path().display());
            }
            return None;
        }

        if !self
            .filter
            .include_file(relative_to(&self.root, entry.path()))
        {
            trace!("Filtered out: {}", entry.path().display());
            return None;
        }

        if let Some(visited) = self.visited.as_mut() {
            match entry.path().canonicalize() {
                Ok(real) => {
                    if !visited.insert(real) {
                        debug!("Already visited through another link: {}", entry.path().display());
                        return None;
                    }
                }
                Err(e) => {
                    let err = SearchError::from_io(entry.path(), e);
                    return Some(WalkItem::Skipped(SkipEvent::from_error(entry.path(), &err)));
                }
            }
        }

        Some(WalkItem::File(FileTask {
            path: entry.into_path(),
        }))
    }
}

impl Iterator for WalkIter {
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if let Some(item) = self.accept(entry) {
                        return Some(item);
                    }
                }
                Err(err) => {
                    let path = error_path(&err).unwrap_or_else(|| self.root.clone());
                    debug!("Skipping {}: {}", path.display(), err);
                    return Some(WalkItem::Skipped(SkipEvent {
                        path,
                        reason: error_reason(&err),
                    }));
                }
            }
        }
    }
}

/// Checks that `root` is an existing directory and returns its canonical form.
pub fn validate_root(root: &Path) -> SearchResult<PathBuf> {
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SearchError::invalid_root(root, "no such directory"),
        _ => SearchError::invalid_root(root, e.to_string()),
    })?;
    if !metadata.is_dir() {
        return Err(SearchError::invalid_root(root, "not a directory"));
    }
    let canonical = root
        .canonicalize()
        .map_err(|e| SearchError::invalid_root(root, e.to_string()))?;
    Ok(strip_unc_prefix(&canonical))
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

fn error_reason(err: &ignore::Error) -> String {
    match err {
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => error_reason(err),
        ignore::Error::Loop { ancestor, .. } => {
            format!("filesystem loop back to {}", ancestor.display())
        }
        ignore::Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            "permission denied".to_string()
        }
        other => other.to_string(),
    }
}
