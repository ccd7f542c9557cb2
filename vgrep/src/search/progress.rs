use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::emitter::EventSink;
use crate::errors::SearchResult;
use crate::events::{ProgressSnapshot, SearchEvent};

#[derive(Debug)]
struct LastEmitted {
    processed: usize,
    at: Instant,
}

/// Counts discovered and processed files and emits progress snapshots.
///
/// The total is bumped before a task is queued, so `processed <= total`
/// holds at every point. Intermediate snapshots are emitted while holding an
/// internal lock and re-read inside it, which keeps `files_processed`
/// strictly increasing on the wire. An intermediate snapshot never reports
/// `processed == total`; only [`ProgressAggregator::finish`] does, once.
#[derive(Debug)]
pub struct ProgressAggregator {
    processed: AtomicUsize,
    total: AtomicUsize,
    every: usize,
    interval: Option<Duration>,
    last: Mutex<LastEmitted>,
    finished: AtomicBool,
}

impl ProgressAggregator {
    pub fn new(every: usize, interval: Option<Duration>) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            every: every.max(1),
            interval,
            last: Mutex::new(LastEmitted {
                processed: 0,
                at: Instant::now(),
            }),
            finished: AtomicBool::new(false),
        }
    }

    /// Records a newly discovered file; returns the new total.
    pub fn discovered(&self) -> usize {
        self.total.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Records a processed file and emits a snapshot when one is due.
    pub fn processed(&self, sink: &dyn EventSink) -> SearchResult<()> {
        let processed = self.processed.fetch_add(1, Ordering::AcqRel) + 1;
        let due_by_count = processed % self.every == 0;
        if !due_by_count && self.interval.is_none() {
            return Ok(());
        }

        // Another worker is emitting; skipping a snapshot only lowers verbosity.
        let Some(mut last) = self.last.try_lock() else {
            return Ok(());
        };
        let due_by_time = self
            .interval
            .is_some_and(|interval| last.at.elapsed() >= interval);
        if !due_by_count && !due_by_time {
            return Ok(());
        }

        let snapshot = self.snapshot();
        if snapshot.files_processed <= last.processed
            || snapshot.files_processed >= snapshot.files_total
        {
            return Ok(());
        }

        sink.emit(SearchEvent::Progress(snapshot))?;
        last.processed = snapshot.files_processed;
        last.at = Instant::now();
        Ok(())
    }

    /// Current counts; `is_final` is always false here.
    pub fn snapshot(&self) -> ProgressSnapshot {
        // processed first: total only grows, so the pair stays consistent
        let files_processed = self.processed.load(Ordering::Acquire);
        let files_total = self.total.load(Ordering::Acquire);
        ProgressSnapshot {
            files_processed,
            files_total,
            is_final: false,
        }
    }

    /// Emits the closing snapshot. Later calls do nothing and return `None`.
    pub fn finish(&self, sink: &dyn EventSink) -> SearchResult<Option<ProgressSnapshot>> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }
        let mut last = self.last.lock();
        let snapshot = ProgressSnapshot {
            is_final: true,
            ..self.snapshot()
        };
        sink.emit(SearchEvent::Progress(snapshot))?;
        last.processed = snapshot.files_processed;
        last.at = Instant::now();
        Ok(Some(snapshot))
    }
}
