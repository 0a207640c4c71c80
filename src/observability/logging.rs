//! # Structured Logging
//!
//! Two sinks share one `EnvFilter`:
//!
//! - console (stderr), raised to `warn` with `--quiet`
//! - a daily rolling file in the log directory, 30 files kept
//!
//! `RUST_LOG` overrides the default level (`info`, or `debug` with `--debug`).

use std::path::{Path, PathBuf};

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE_PREFIX: &str = "certsync";
pub const LOG_FILES_KEPT: usize = 30;

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub debug: bool,
    pub quiet: bool,
    /// `None` disables the file sink
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn default_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn console_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::WARN
        } else {
            LevelFilter::TRACE
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level()));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(config.console_level());

    let (file, guard) = match config.log_dir.as_deref().and_then(file_appender) {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if tracing_subscriber::registry().with(env_filter).with(console).with(file).try_init().is_err() {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }

    guard
}

/// Rolling appender in `dir`, falling back to the working directory when
/// `dir` cannot be created.
fn file_appender(dir: &Path) -> Option<RollingFileAppender> {
    let dir = match std::fs::create_dir_all(dir) {
        Ok(()) => dir.to_path_buf(),
        Err(e) => {
            eprintln!(
                "Error creating log directory {}. Defaulting to working directory. {}",
                dir.display(),
                e
            );
            PathBuf::from(".")
        }
    };

    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(LOG_FILES_KEPT)
        .build(&dir)
    {
        Ok(appender) => Some(appender),
        Err(e) => {
            eprintln!("Error opening log file in {}. File logging disabled. {}", dir.display(), e);
            None
        }
    }
}
