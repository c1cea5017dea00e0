//! Subscriber setup for processes embedding a bridge.
//!
//! Console output always goes to stderr: a bridge served over stdio owns
//! stdout for frames.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const DEFAULT_FILTER: &str =
    "postbridge=debug,postbridge_core=debug,postbridge_transport=debug,warn";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Where and how bridge logs are written.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory for daily-rotated files; `None` logs to stderr only
    pub dir: Option<PathBuf>,
    pub file_prefix: String,
    /// Used when `RUST_LOG` is unset
    pub filter: String,
    /// Write file records as JSON lines instead of text
    pub json_files: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: "postbridge".to_string(),
            filter: DEFAULT_FILTER.to_string(),
            json_files: false,
        }
    }
}

impl LogOptions {
    pub fn to_dir(dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            dir: Some(dir.into()),
            file_prefix: file_prefix.into(),
            ..Self::default()
        }
    }

    pub fn json(mut self) -> Self {
        self.json_files = true;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// Keeps the file writer flushing. Dropping it flushes and stops file output.
#[derive(Debug)]
#[must_use = "file logging stops when the guard is dropped"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn file_layer(options: &LogOptions) -> anyhow::Result<Option<(BoxedLayer, WorkerGuard)>> {
    let Some(dir) = &options.dir else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&options.file_prefix)
        .build(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_timer(ChronoUtc::rfc_3339())
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(writer);
    let layer = if options.json_files {
        layer.json().boxed()
    } else {
        layer.boxed()
    };
    Ok(Some((layer, guard)))
}

/// Install the global subscriber described by `options`.
pub fn init_logging_with(options: &LogOptions) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = vec![fmt::layer()
        .with_timer(ChronoUtc::rfc_3339())
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .boxed()];

    let file_guard = match file_layer(options)? {
        Some((layer, guard)) => {
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(options.env_filter())
        .try_init()?;

    tracing::info!(dir = ?options.dir, json = options.json_files, "Logging initialized");
    Ok(LoggingGuard { _file: file_guard })
}

/// Text logs to stderr and to daily files `<log_dir>/<log_prefix>.<date>`.
pub fn init_logging(
    log_dir: impl Into<PathBuf>,
    log_prefix: &str,
) -> anyhow::Result<LoggingGuard> {
    init_logging_with(&LogOptions::to_dir(log_dir, log_prefix))
}

/// Console-only logging captured by the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let options = LogOptions::default().with_filter("postbridge=trace,postbridge_core=trace,debug");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(options.env_filter())
        .with_test_writer()
        .try_init();
}
