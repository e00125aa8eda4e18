//! Tracing setup for labgrader binaries.
//!
//! Two sinks:
//!
//! * the console (stderr), filtered by `LABGRADER_LOG`, then `RUST_LOG`,
//!   then the configured level, optionally as JSON lines;
//! * an optional grade log file that always records `INFO` and above in
//!   plain text, appended across runs, so every grade, poison write and
//!   rejection leaves a trace after the terminal is gone.
//!
//! Stdout is left to command output.

use std::path::{Path, PathBuf};

use tracing::level_filters::LevelFilter;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "LABGRADER_LOG";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log file path {0} does not name a file")]
    NotAFile(PathBuf),

    #[error("cannot open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: InitError,
    },
}

/// What [`init_tracing`] installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Newline-delimited JSON on the console
    pub json: bool,
    /// Console verbosity when no filter variable is set
    pub level: Level,
    /// Grade log file, appended to at `INFO`
    pub log_file: Option<PathBuf>,
}

impl TracingConfig {
    pub fn new(json: bool, level: Level) -> Self {
        Self {
            json,
            level,
            log_file: None,
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// Keeps the file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops the log file writer"]
#[derive(Debug)]
pub struct TracingGuard {
    _file: Option<WorkerGuard>,
}

/// Initialise the global tracing subscriber.
///
/// Safe to call more than once; only the first call installs anything.
/// The log file is still opened on later calls, so a bad path is reported
/// either way.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TelemetryError> {
    let console = console_layer(config.json, config.level);
    let (file, guard) = match &config.log_file {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .ok();

    Ok(TracingGuard { _file: guard })
}

fn console_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn console_layer<S>(json: bool, level: Level) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        layer.json().with_filter(console_filter(level)).boxed()
    } else {
        layer.with_filter(console_filter(level)).boxed()
    }
}

/// Plain-text `INFO+` layer appending to `path`. Missing parent
/// directories are created.
pub fn file_layer<S>(
    path: &Path,
) -> Result<(impl Layer<S> + Send + Sync, WorkerGuard), TelemetryError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file_name = path
        .file_name()
        .ok_or_else(|| TelemetryError::NotAFile(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map_err(|source| TelemetryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(LevelFilter::INFO);
    Ok((layer, guard))
}
