use clap::Parser;
use colored::Colorize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use vgrep::{CancelToken, CliOverrides, LineEmitter, SearchConfig, SearchError, Searcher};

type Result<T> = std::result::Result<T, SearchError>;

/// Search a directory tree for lines containing a term, ignoring case
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to search
    root: PathBuf,

    /// Literal text to look for
    term: String,

    /// Number of scan workers
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Configuration file, applied over ~/.config/vgrep/config.yaml and ./.vgrep.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this long (e.g. 30s, 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Print progress every N processed files
    #[arg(long)]
    progress_every: Option<usize>,

    /// Also print progress when this much time passed (e.g. 500ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    progress_interval: Option<Duration>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_links: bool,

    /// Scan files that look binary
    #[arg(long)]
    include_binary: bool,

    /// File extensions to include (e.g. rs,go,js)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Patterns to ignore (glob format)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Honour .gitignore, .ignore and hidden-file rules
    #[arg(long)]
    respect_ignore: bool,

    /// Log level for stderr diagnostics (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        let file_extensions = self.extensions.as_ref().map(|e| {
            e.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        CliOverrides {
            root_path: Some(self.root.clone()),
            term: Some(self.term.clone()),
            thread_count: self.threads,
            progress_every: self.progress_every,
            progress_interval_ms: self
                .progress_interval
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            follow_links: self.follow_links,
            include_binary: self.include_binary,
            file_extensions,
            ignore_patterns: self.ignore.clone(),
            respect_ignore_files: self.respect_ignore,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = SearchConfig::load_from(cli.config.as_deref())?.merge_with_cli(cli.overrides());
    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    let request = config.request()?;
    let searcher = Searcher::new(config)?;

    let mut cancel = CancelToken::new();
    if let Some(timeout) = cli.timeout {
        cancel = cancel.with_deadline(Instant::now() + timeout);
    }
    let interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || interrupt.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    match searcher.run(&request, &LineEmitter::stdio(), &cancel) {
        Ok(summary) => {
            debug!("{:?}", summary);
            Ok(())
        }
        // Downstream closed stdout (e.g. piped into `head`)
        Err(SearchError::Output(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e),
    }
}
