//! Concurrent search pipeline.
//!
//! A run is split into small pieces that each own one concern:
//!
//! 1. [`walker`] enumerates regular files under the root in a stable order.
//! 2. The walker's files are queued on a bounded channel and picked up by a
//!    fixed set of workers on a rayon pool ([`engine`]).
//! 3. Each worker streams a file line by line through [`scanner`], using the
//!    case-insensitive literal [`matcher`].
//! 4. [`progress`] counts discovered and processed files and decides when a
//!    snapshot is due.
//! 5. [`cancel`] lets the caller, a deadline, or a failing sink stop the run.
//!
//! ```rust,ignore
//! let searcher = Searcher::new(config)?;
//! let summary = searcher.run(&request, &LineEmitter::stdio(), &CancelToken::new())?;
//! ```

pub mod cancel;
pub mod engine;
pub mod matcher;
pub mod progress;
pub mod scanner;
pub mod walker;

pub use cancel::CancelToken;
pub use engine::{search, SearchHandle, Searcher};
pub use matcher::TermMatcher;
pub use progress::ProgressAggregator;
pub use scanner::{FileScanner, ScanOutcome};
pub use walker::{validate_root, WalkItem, Walker};
