//! Logging setup for sqlgate.
//!
//! Logs always go to stderr so stdout carries only command output.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "sqlgate=info,warn";

/// Builds the filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Picks the fallback filter for a `-v` count.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_FILTER,
        1 => "sqlgate=debug,info",
        _ => "trace",
    }
}

/// Initializes logging to stderr.
///
/// Safe to call once per process; later calls are ignored.
pub fn init_stderr_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter(verbosity)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
