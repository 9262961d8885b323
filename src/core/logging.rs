//! Logging initialization
//!
//! The codebase logs through the `log` facade macros. At startup the facade
//! is bridged into `tracing` so one subscriber formats everything; the
//! filter is taken from `RUST_LOG` with an `info` default.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber and the log-to-tracing bridge.
///
/// Safe to call once per process; a second call returns an error from the
/// underlying global-subscriber registration.
pub fn init_logger() -> Result<()> {
    tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to install log bridge: {}", e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set subscriber: {}", e))?;

    Ok(())
}
