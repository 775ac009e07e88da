//! Logging setup.

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{RestartError, Result};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init(log_level: &str, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| RestartError::Config(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| RestartError::Config(format!("Failed to init logging: {}", e)))?;
    }

    debug!("Logging initialized");
    Ok(())
}
