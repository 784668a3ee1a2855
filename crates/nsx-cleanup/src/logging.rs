//! Tracing subscriber setup for teardown runs

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level selected by the `--debug` and `--log-level` flags
pub fn log_level(debug: bool, log_level: u8) -> Level {
    match (debug, log_level) {
        (_, n) if n >= 2 => Level::TRACE,
        (true, _) | (_, 1) => Level::DEBUG,
        _ => Level::INFO,
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG` plus the selected level.
///
/// Meant to be called once at startup by the binary embedding the engine,
/// typically the operator's `clean` subcommand with the values from
/// [`CleanArgs`](crate::config::CleanArgs). Returns an error if a global
/// subscriber is already set.
pub fn init_logging(debug: bool, level: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(log_level(debug, level).into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
