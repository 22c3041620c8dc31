use std::{
    fmt,
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};
use tracing::{level_filters::LevelFilter, Subscriber};
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter, Registry};

#[derive(Debug)]
pub enum LoggingError {
    LogFile { path: PathBuf, source: io::Error },
    AlreadyInitialized(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::LogFile { path, source } => {
                write!(f, "Failed to open log file {}: {}", path.display(), source)
            }
            LoggingError::AlreadyInitialized(e) => write!(f, "Logging already initialized: {e}"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Initialize logging to stderr and optionally to a file.
///
/// Stdout is left alone: the proxy prints its solve records there.
/// The level is read from `RUST_LOG` and defaults to "info".
pub fn init_logging(log_file: Option<&Path>) -> Result<(), LoggingError> {
    let subscriber = build_subscriber(log_file)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

/// Builds the subscriber installed by [`init_logging`]. The log file, if any, is opened in
/// append mode before anything is logged so a bad path fails startup.
pub fn build_subscriber(
    log_file: Option<&Path>,
) -> Result<Box<dyn Subscriber + Send + Sync>, LoggingError> {
    let stderr_layer = tracing_fmt::layer().with_writer(io::stderr);

    let subscriber: Box<dyn Subscriber + Send + Sync> = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::LogFile {
                    path: path.to_owned(),
                    source,
                })?;
            let file_layer = tracing_fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            Box::new(
                Registry::default()
                    .with(env_filter())
                    .with(stderr_layer)
                    .with(file_layer),
            )
        }
        None => Box::new(Registry::default().with(env_filter()).with(stderr_layer)),
    };
    Ok(subscriber)
}

fn env_filter() -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = LevelFilter::from_str(&rust_log).unwrap_or(LevelFilter::INFO);
    EnvFilter::new(log_level_filter.to_string())
}
