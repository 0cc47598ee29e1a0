//! Logging setup.
//!
//! Diagnostics go through `tracing`. The CLI picks a level from its `-v` and
//! `-q` flags; `RUST_LOG` overrides it.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and errors. The timer face owns the terminal while recording.
    #[default]
    Normal,
    /// Info and above.
    Verbose,
    /// Everything, including per-update feed tracing.
    Trace,
}

impl Verbosity {
    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::Trace => Level::TRACE,
        }
    }

    /// Default filter directive for this crate.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        format!("ghosttimer={}", self.to_level_filter())
    }
}

/// Initialize the logging system.
///
/// Logs are written to stderr so they never interleave with exported data
/// on stdout. Safe to call more than once; only the first call installs a
/// subscriber.
///
/// ```no_run
/// use ghosttimer::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
