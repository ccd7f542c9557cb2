use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};
use crate::events::SearchRequest;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".vgrep.yaml";

/// Configuration for a search run.
///
/// # Configuration Locations
///
/// Values are layered, later sources overriding earlier ones:
/// 1. Global `$HOME/.config/vgrep/config.yaml`
/// 2. Local `.vgrep.yaml` in the current directory
/// 3. Custom config file given with `--config`
/// 4. Command-line flags (see [`CliOverrides`])
///
/// # Configuration Format
///
/// ```yaml
/// # Number of scan workers (default: CPU cores)
/// thread_count: 4
///
/// # Bounded queue between the directory walker and the workers
/// queue_capacity: 1024
///
/// # Emit a progress line every N processed files...
/// progress_every: 1
/// # ...or when this many milliseconds passed since the last one
/// progress_interval_ms: 250
///
/// # Follow symbolic links (cycles are detected and skipped)
/// follow_links: false
///
/// # Skip files that look binary (NUL byte in the first chunk)
/// skip_binary: true
///
/// # Only scan these extensions
/// file_extensions: ["rs", "toml"]
///
/// # Glob patterns to leave out
/// ignore_patterns: ["**/target/**"]
///
/// # Honour .gitignore / .ignore files and skip hidden entries
/// respect_ignore_files: false
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Root directory to start the search from
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Literal term, matched case-insensitively
    #[serde(default)]
    pub term: String,

    /// Number of scan workers
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Capacity of the walker to worker task queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Capacity of the event channel used by [`crate::Searcher::spawn`]
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Emit an intermediate progress snapshot every N processed files
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// Also emit one when this much time passed since the previous snapshot
    #[serde(default)]
    pub progress_interval_ms: Option<u64>,

    #[serde(default)]
    pub follow_links: bool,

    #[serde(default = "default_skip_binary")]
    pub skip_binary: bool,

    /// Optional list of file extensions to include (e.g., ["rs", "toml"])
    /// If None, all files are included
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,

    /// Patterns to ignore (glob syntax)
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default)]
    pub respect_ignore_files: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_event_capacity() -> usize {
    4096
}

fn default_progress_every() -> usize {
    1
}

fn default_skip_binary() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            term: String::new(),
            thread_count: default_thread_count(),
            queue_capacity: default_queue_capacity(),
            event_capacity: default_event_capacity(),
            progress_every: default_progress_every(),
            progress_interval_ms: None,
            follow_links: false,
            skip_binary: default_skip_binary(),
            file_extensions: None,
            ignore_patterns: Vec::new(),
            respect_ignore_files: false,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_path: Option<PathBuf>,
    pub term: Option<String>,
    pub thread_count: Option<NonZeroUsize>,
    pub progress_every: Option<usize>,
    pub progress_interval_ms: Option<u64>,
    pub follow_links: bool,
    pub include_binary: bool,
    pub file_extensions: Option<Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub respect_ignore_files: bool,
    pub log_level: Option<String>,
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an explicit file.
    ///
    /// The explicit file must exist; the default locations are optional.
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("vgrep").join("config.yaml")),
            Some(PathBuf::from(LOCAL_CONFIG_FILE)),
        ];
        for path in defaults.iter().flatten() {
            if path.is_file() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Merges command-line values over the loaded configuration
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(root) = cli.root_path {
            self.root_path = root;
        }
        if let Some(term) = cli.term {
            self.term = term;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if let Some(every) = cli.progress_every {
            self.progress_every = every;
        }
        if cli.progress_interval_ms.is_some() {
            self.progress_interval_ms = cli.progress_interval_ms;
        }
        if cli.follow_links {
            self.follow_links = true;
        }
        if cli.include_binary {
            self.skip_binary = false;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns.extend(cli.ignore_patterns);
        }
        if cli.respect_ignore_files {
            self.respect_ignore_files = true;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> SearchResult<()> {
        if self.queue_capacity == 0 {
            return Err(SearchError::config_error("queue_capacity must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(SearchError::config_error("event_capacity must be > 0"));
        }
        if self.progress_every == 0 {
            return Err(SearchError::config_error("progress_every must be > 0"));
        }
        for pattern in &self.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                SearchError::config_error(format!("invalid ignore pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Option<Duration> {
        self.progress_interval_ms.map(Duration::from_millis)
    }

    /// Builds the immutable request for this run.
    pub fn request(&self) -> SearchResult<SearchRequest> {
        SearchRequest::new(&self.root_path, &self.term)
    }
}
