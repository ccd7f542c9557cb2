use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Tracks scan throughput for one run
#[derive(Debug, Clone, Default)]
pub struct ScanMetrics {
    bytes_scanned: Arc<AtomicU64>,
    lines_scanned: Arc<AtomicU64>,
    longest_line: Arc<AtomicU64>,

    files_scanned: Arc<AtomicU64>,
    binary_files: Arc<AtomicU64>,
    failed_files: Arc<AtomicU64>,
    lossy_lines: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed file scan
    pub fn record_file(&self, bytes: u64, lines: u64) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
        self.lines_scanned.fetch_add(lines, Ordering::Relaxed);
    }

    /// Keeps the longest line seen, which bounds per-worker buffer growth
    pub fn record_line_length(&self, len: u64) {
        let mut peak = self.longest_line.load(Ordering::Relaxed);
        while len > peak {
            match self.longest_line.compare_exchange_weak(
                peak,
                len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => peak = current,
            }
        }
    }

    pub fn record_binary(&self) {
        self.binary_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// A matching line had invalid UTF-8 replaced
    pub fn record_lossy_line(&self) {
        self.lossy_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            lines_scanned: self.lines_scanned.load(Ordering::Relaxed),
            longest_line: self.longest_line.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            binary_files: self.binary_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
            lossy_lines: self.lossy_lines.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Files scanned/binary/failed: {}/{}/{}\n\
             Bytes scanned: {}\n\
             Lines scanned: {}\n\
             Longest line: {} bytes\n\
             Lossy matching lines: {}",
            stats.files_scanned,
            stats.binary_files,
            stats.failed_files,
            stats.bytes_scanned,
            stats.lines_scanned,
            stats.longest_line,
            stats.lossy_lines
        );
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_scanned: u64,
    pub lines_scanned: u64,
    pub longest_line: u64,
    pub files_scanned: u64,
    pub binary_files: u64,
    pub failed_files: u64,
    pub lossy_lines: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_tracking() {
        let metrics = ScanMetrics::new();
        metrics.record_file(100, 3);
        metrics.record_file(50, 2);
        let stats = metrics.get_stats();
        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.bytes_scanned, 150);
        assert_eq!(stats.lines_scanned, 5);
    }

    #[test]
    fn test_longest_line_is_a_peak() {
        let metrics = ScanMetrics::new();
        metrics.record_line_length(10);
        metrics.record_line_length(500);
        metrics.record_line_length(20);
        assert_eq!(metrics.get_stats().longest_line, 500);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ScanMetrics::new();
        let other = metrics.clone();
        other.record_binary();
        other.record_failure();
        other.record_lossy_line();
        let stats = metrics.get_stats();
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.lossy_lines, 1);
    }
}
