//! Event sinks: where a running search delivers its events.
//!
//! The engine only knows the [`EventSink`] trait. Three implementations ship
//! with the crate:
//!
//! * [`LineEmitter`] renders the line protocol used by the command-line tool
//!   (`Processed <n>/<total>` and `<path>:<line>:<content>` on stdout, skip
//!   reasons on stderr). Every line is written and flushed under one lock, so
//!   concurrent workers never interleave partial lines.
//! * `crossbeam_channel::Sender<SearchEvent>` hands events to another thread.
//!   A bounded channel makes workers wait for a slow listener instead of
//!   dropping events.
//! * [`CallbackSink`] wraps a closure; [`CollectSink`] keeps everything in
//!   memory.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::io::{self, Stderr, Stdout, Write};
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::events::SearchEvent;

/// Receives events from a running search. Called concurrently by workers.
pub trait EventSink: Send + Sync {
    /// Delivers one event. An error ends the run.
    fn emit(&self, event: SearchEvent) -> SearchResult<()>;
}

impl EventSink for Sender<SearchEvent> {
    fn emit(&self, event: SearchEvent) -> SearchResult<()> {
        self.send(event).map_err(|_| {
            SearchError::Output(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "event receiver dropped",
            ))
        })
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn emit(&self, event: SearchEvent) -> SearchResult<()> {
        (**self).emit(event)
    }
}

/// Renders an event as its protocol line, without the newline
pub fn format_line(event: &SearchEvent) -> String {
    match event {
        SearchEvent::Match(m) => m.to_string(),
        SearchEvent::Progress(p) => p.to_string(),
        SearchEvent::Skipped(s) => s.to_string(),
    }
}

struct Streams<O, E> {
    out: O,
    err: E,
}

/// Writes the line protocol: matches and progress to `out`, skips to `err`
pub struct LineEmitter<O: Write + Send, E: Write + Send> {
    streams: Mutex<Streams<O, E>>,
}

impl LineEmitter<Stdout, Stderr> {
    /// Emitter over the process's stdout and stderr
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write + Send, E: Write + Send> LineEmitter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            streams: Mutex::new(Streams { out, err }),
        }
    }

    /// Returns the underlying writers
    pub fn into_inner(self) -> (O, E) {
        let streams = self.streams.into_inner();
        (streams.out, streams.err)
    }
}

impl<O: Write + Send, E: Write + Send> EventSink for LineEmitter<O, E> {
    fn emit(&self, event: SearchEvent) -> SearchResult<()> {
        let line = format_line(&event);
        let mut streams = self.streams.lock();
        match event {
            SearchEvent::Match(_) | SearchEvent::Progress(_) => {
                writeln!(streams.out, "{}", line).map_err(SearchError::Output)?;
                streams.out.flush().map_err(SearchError::Output)
            }
            SearchEvent::Skipped(_) => {
                // Losing a diagnostic line must not end the search
                if let Err(e) = writeln!(streams.err, "{}", line).and_then(|_| streams.err.flush())
                {
                    debug!("Failed to write skip line: {}", e);
                }
                Ok(())
            }
        }
    }
}

/// Adapts a closure into an [`EventSink`]
pub struct CallbackSink<F>(F);

impl<F> CallbackSink<F>
where
    F: Fn(SearchEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(SearchEvent) + Send + Sync,
{
    fn emit(&self, event: SearchEvent) -> SearchResult<()> {
        (self.0)(event);
        Ok(())
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct CollectSink {
    events: Mutex<Vec<SearchEvent>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events received so far
    pub fn events(&self) -> Vec<SearchEvent> {
        self.events.lock().clone()
    }

    pub fn into_events(self) -> Vec<SearchEvent> {
        self.events.into_inner()
    }
}

impl EventSink for CollectSink {
    fn emit(&self, event: SearchEvent) -> SearchResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
