//! Tracing setup
//!
//! The engine is a library, so initialization stays deliberately narrow:
//! one rolling file writer, and a default filter scoped to this crate
//! (`spotmatch=<level>`) so an embedding application's own log filters
//! are never widened by us. `RUST_LOG` still overrides everything.
//! Commit activity lands at `debug`, match resolution at `trace`.

use crate::config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber from a [`LogConfig`].
///
/// Returns the appender guard; dropping it flushes buffered log lines,
/// so hold it for the lifetime of the process.
pub fn init_logging(config: &LogConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(rolling_appender(config));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("spotmatch={}", config.log_level)));

    let file_layer = if config.use_json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::layer().with_writer(writer).with_ansi(false).boxed()
    };

    tracing_subscriber::registry().with(filter).with(file_layer).init();
    guard
}

fn rolling_appender(config: &LogConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}
