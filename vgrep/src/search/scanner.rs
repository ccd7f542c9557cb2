use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace};

use super::cancel::CancelToken;
use super::matcher::TermMatcher;
use crate::errors::{SearchError, SearchResult};
use crate::events::MatchEvent;
use crate::metrics::ScanMetrics;

/// Read buffer size; also the window sniffed for NUL bytes
pub(crate) const BUFFER_CAPACITY: usize = 64 * 1024;
/// Initial capacity of a worker's reusable line buffer
pub(crate) const LINE_BUFFER_CAPACITY: usize = 1024;

/// Result of scanning one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub matched_lines: usize,
    pub lines: u64,
    pub bytes_scanned: u64,
    /// The scan stopped early because the run was cancelled
    pub cancelled: bool,
}

/// Scans one file at a time for lines containing the term.
///
/// Files are streamed line by line through a caller-owned buffer, so memory
/// use is bounded by the longest line rather than the file size.
#[derive(Debug, Clone)]
pub struct FileScanner {
    matcher: TermMatcher,
    skip_binary: bool,
    metrics: ScanMetrics,
}

impl FileScanner {
    pub fn new(matcher: TermMatcher, skip_binary: bool) -> Self {
        Self {
            matcher,
            skip_binary,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn matcher(&self) -> &TermMatcher {
        &self.matcher
    }

    /// Scans `path`, calling `on_match` for each matching line in order.
    ///
    /// Errors opening or reading the file are returned for the caller to
    /// report as a skip. Errors returned by `on_match` abort the scan and are
    /// passed through unchanged. Cancellation is checked before every line.
    pub fn scan<F>(
        &self,
        path: &Path,
        buf: &mut Vec<u8>,
        cancel: &CancelToken,
        mut on_match: F,
    ) -> SearchResult<ScanOutcome>
    where
        F: FnMut(MatchEvent) -> SearchResult<()>,
    {
        trace!("Scanning file: {}", path.display());

        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);

        if self.skip_binary {
            let head = reader.fill_buf().map_err(|e| SearchError::from_io(path, e))?;
            if head.contains(&0) {
                self.metrics.record_binary();
                return Err(SearchError::binary_file(path));
            }
        }

        let mut outcome = ScanOutcome::default();
        loop {
            if cancel.is_cancelled() {
                debug!("Scan of {} cancelled at line {}", path.display(), outcome.lines);
                outcome.cancelled = true;
                break;
            }

            buf.clear();
            let read = reader
                .read_until(b'\n', buf)
                .map_err(|e| SearchError::from_io(path, e))?;
            if read == 0 {
                break;
            }
            outcome.lines += 1;
            outcome.bytes_scanned += read as u64;

            let line = trim_line_ending(&buf[..]);
            self.metrics.record_line_length(line.len() as u64);
            if !self.matcher.is_match(line) {
                continue;
            }

            let line_content = match String::from_utf8_lossy(line) {
                Cow::Borrowed(s) => s.to_owned(),
                Cow::Owned(s) => {
                    trace!(
                        "Invalid UTF-8 replaced in {} line {}",
                        path.display(),
                        outcome.lines
                    );
                    self.metrics.record_lossy_line();
                    s
                }
            };

            on_match(MatchEvent {
                file_path: path.to_path_buf(),
                line_number: outcome.lines as usize,
                line_content,
            })?;
            outcome.matched_lines += 1;
        }

        self.metrics.record_file(outcome.bytes_scanned, outcome.lines);
        Ok(outcome)
    }
}

/// Strips a trailing `\n` or `\r\n`
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
