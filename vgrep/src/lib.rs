#![deny(unused_doc_comments)]

pub mod config;
pub mod emitter;
pub mod errors;
pub mod events;
pub mod filters;
pub mod metrics;
pub mod search;

pub use config::{CliOverrides, SearchConfig};
pub use emitter::{format_line, CallbackSink, CollectSink, EventSink, LineEmitter};
pub use errors::{SearchError, SearchResult};
pub use events::{
    FileTask, MatchEvent, ProgressSnapshot, SearchEvent, SearchRequest, SearchSummary, SkipEvent,
};
pub use search::{search, CancelToken, SearchHandle, Searcher};
