use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use super::cancel::CancelToken;
use super::matcher::TermMatcher;
use super::progress::ProgressAggregator;
use super::scanner::{FileScanner, LINE_BUFFER_CAPACITY};
use super::walker::{WalkItem, Walker};
use crate::config::SearchConfig;
use crate::emitter::EventSink;
use crate::errors::{SearchError, SearchResult};
use crate::events::{FileTask, SearchEvent, SearchRequest, SearchSummary, SkipEvent};

/// Runs searches with one configuration.
///
/// A run enumerates files on the calling thread and hands them over a
/// bounded queue to `thread_count` workers on a dedicated rayon pool. Each
/// worker scans one file at a time and reports matches to the sink as it
/// finds them.
#[derive(Debug, Clone)]
pub struct Searcher {
    config: SearchConfig,
}

/// State shared by the producer and the workers of one run
struct RunState<'a> {
    sink: &'a dyn EventSink,
    cancel: &'a CancelToken,
    progress: ProgressAggregator,
    scanner: FileScanner,
    matched_lines: AtomicUsize,
    files_skipped: AtomicUsize,
    bytes_scanned: AtomicU64,
    // First sink failure; ends the run with an error.
    failure: Mutex<Option<SearchError>>,
}

impl RunState<'_> {
    fn emit(&self, event: SearchEvent) -> bool {
        match self.sink.emit(event) {
            Ok(()) => true,
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn fail(&self, err: SearchError) {
        warn!("Stopping search: {}", err);
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(err);
        }
        self.cancel.cancel();
    }

    fn work(&self, tasks: Receiver<FileTask>) {
        let mut buf = Vec::with_capacity(LINE_BUFFER_CAPACITY);
        for task in tasks.iter() {
            if self.cancel.is_cancelled() {
                break;
            }

            let scanned = self.scanner.scan(&task.path, &mut buf, self.cancel, |m| {
                self.sink.emit(SearchEvent::Match(m))
            });
            match scanned {
                Ok(outcome) => {
                    self.matched_lines
                        .fetch_add(outcome.matched_lines, Ordering::Relaxed);
                    self.bytes_scanned
                        .fetch_add(outcome.bytes_scanned, Ordering::Relaxed);
                    if outcome.cancelled {
                        break;
                    }
                }
                Err(e @ SearchError::Output(_)) => {
                    self.fail(e);
                    break;
                }
                Err(e) => {
                    debug!("Skipping {}: {}", task.path.display(), e);
                    if !matches!(e, SearchError::BinaryFile(_)) {
                        self.scanner.metrics().record_failure();
                    }
                    self.files_skipped.fetch_add(1, Ordering::Relaxed);
                    if !self.emit(SearchEvent::Skipped(SkipEvent::from_error(&task.path, &e))) {
                        break;
                    }
                }
            }

            if let Err(e) = self.progress.processed(self.sink) {
                self.fail(e);
                break;
            }
        }
        // Shrink buffers that grew on a pathological line before the thread idles
        buf.clear();
        buf.shrink_to(LINE_BUFFER_CAPACITY);
    }
}

impl Searcher {
    pub fn new(config: SearchConfig) -> SearchResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs a search to completion on the calling thread.
    ///
    /// Events go to `sink` as they happen. Returns `Err` only for fatal
    /// errors, detected before any event is emitted, or when the sink fails.
    /// A cancelled run returns `Ok` with `cancelled` set and without the
    /// final progress snapshot.
    pub fn run(
        &self,
        request: &SearchRequest,
        sink: &dyn EventSink,
        cancel: &CancelToken,
    ) -> SearchResult<SearchSummary> {
        let start = Instant::now();
        let walker = Walker::new(request.root_directory(), &self.config)?;
        let matcher = TermMatcher::new(request.term())?;
        let threads = self.config.thread_count.get();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vgrep-worker-{}", i))
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;

        info!(
            "Searching {} for '{}' with {} workers",
            walker.root().display(),
            request.term(),
            threads
        );

        let state = RunState {
            sink,
            cancel,
            progress: ProgressAggregator::new(
                self.config.progress_every,
                self.config.progress_interval(),
            ),
            scanner: FileScanner::new(matcher, self.config.skip_binary),
            matched_lines: AtomicUsize::new(0),
            files_skipped: AtomicUsize::new(0),
            bytes_scanned: AtomicU64::new(0),
            failure: Mutex::new(None),
        };

        let (tx, rx) = bounded::<FileTask>(self.config.queue_capacity);
        let walk_complete = pool.in_place_scope(|scope| {
            for _ in 0..threads {
                let rx = rx.clone();
                let state = &state;
                scope.spawn(move |_| state.work(rx));
            }
            // Workers hold the only receivers, so a send fails once they all stop.
            drop(rx);

            for item in walker.iter() {
                if cancel.is_cancelled() {
                    return false;
                }
                match item {
                    WalkItem::File(task) => {
                        trace!("Queueing {}", task.path.display());
                        state.progress.discovered();
                        if tx.send(task).is_err() {
                            return false;
                        }
                    }
                    WalkItem::Skipped(skip) => {
                        if !state.emit(SearchEvent::Skipped(skip)) {
                            return false;
                        }
                    }
                }
            }
            drop(tx);
            true
        });

        if let Some(err) = state.failure.lock().take() {
            return Err(err);
        }

        let counts = state.progress.snapshot();
        let cancelled = !walk_complete || counts.files_processed != counts.files_total;
        if cancelled {
            info!(
                "Search cancelled after {}/{} files",
                counts.files_processed, counts.files_total
            );
        } else {
            state.progress.finish(sink)?;
        }

        state.scanner.metrics().log_stats();
        let summary = SearchSummary {
            files_total: counts.files_total,
            files_processed: counts.files_processed,
            files_skipped: state.files_skipped.load(Ordering::Relaxed),
            matched_lines: state.matched_lines.load(Ordering::Relaxed),
            bytes_scanned: state.bytes_scanned.load(Ordering::Relaxed),
            cancelled,
            elapsed: start.elapsed(),
        };
        info!(
            "Search finished: {} matching lines in {}/{} files ({:?})",
            summary.matched_lines, summary.files_processed, summary.files_total, summary.elapsed
        );
        Ok(summary)
    }

    /// Starts a search on a background thread.
    ///
    /// Fatal errors in the request are reported here, before the thread is
    /// started. Events arrive on [`SearchHandle::events`]; the channel holds
    /// at most `event_capacity` events, after which workers wait for the
    /// receiver.
    pub fn spawn(self, request: SearchRequest, cancel: CancelToken) -> SearchResult<SearchHandle> {
        Walker::new(request.root_directory(), &self.config)?;
        TermMatcher::new(request.term())?;

        let (tx, rx) = bounded::<SearchEvent>(self.config.event_capacity);
        let token = cancel.clone();
        let thread = thread::Builder::new()
            .name("vgrep-search".to_string())
            .spawn(move || self.run(&request, &tx, &token))
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;

        Ok(SearchHandle {
            events: rx,
            cancel,
            thread,
        })
    }
}

/// A search running on a background thread
pub struct SearchHandle {
    events: Receiver<SearchEvent>,
    cancel: CancelToken,
    thread: JoinHandle<SearchResult<SearchSummary>>,
}

impl SearchHandle {
    /// Event stream of the run; disconnects when the run ends.
    pub fn events(&self) -> &Receiver<SearchEvent> {
        &self.events
    }

    /// Asks the run to stop. Already emitted events stay valid.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Waits for the run to end. Events not yet received are discarded.
    pub fn join(self) -> SearchResult<SearchSummary> {
        for _ in self.events.iter() {}
        self.thread
            .join()
            .map_err(|_| SearchError::ThreadPool("search thread panicked".to_string()))?
    }
}

/// Runs one search described entirely by `config`.
pub fn search(config: &SearchConfig, sink: &dyn EventSink) -> SearchResult<SearchSummary> {
    let request = config.request()?;
    Searcher::new(config.clone())?.run(&request, sink, &CancelToken::new())
}
