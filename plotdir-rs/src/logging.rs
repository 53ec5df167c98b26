//! Diagnostic logging setup.
//!
//! Logs go through `tracing`.  The filter comes from `RUST_LOG` and
//! defaults to `warn`, so a normal run prints nothing beyond the operator
//! output on stdout.  With `--log-file` the events are appended to that
//! file through a non-blocking writer instead of going to stderr.
//!
//! Stderr may share the terminal with a run in raw mode, so when it is a
//! terminal each record's newline is written as `\r\n`.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::terminal::{self, CrlfWriter};

const DEFAULT_FILTER: &str = "warn";

/// Keeps the file writer alive.  Buffered events are flushed on drop.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.  A second call is a no-op.
pub fn init(log_file: Option<&Path>) -> io::Result<LoggingGuard> {
    let Some(path) = log_file else {
        let registry = tracing_subscriber::registry().with(env_filter());
        let layer = fmt::layer().with_target(false).compact();
        let _ = if terminal::stderr_is_tty() {
            registry.with(layer.with_writer(|| CrlfWriter(io::stderr()))).try_init()
        } else {
            registry.with(layer.with_writer(io::stderr)).try_init()
        };
        return Ok(LoggingGuard { _file_guard: None });
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        .try_init();

    tracing::info!(log_path = %path.display(), "logging initialized");
    Ok(LoggingGuard { _file_guard: Some(guard) })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
