//! Process-wide log output.
//!
//! Library code logs through the `log` macros and opens `tracing` spans;
//! both end up in the same subscriber once [`init_logging`] has run.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::ConfigError;

/// Installs the global subscriber and bridges `log` records into it.
///
/// `RUST_LOG` takes precedence over the configured level. Returns
/// `Ok(false)` if a global subscriber was already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<bool, ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
            ConfigError::Logging(format!("invalid level '{}': {}", settings.level, e))
        })?,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(settings.json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!settings.json).then(tracing_subscriber::fmt::layer));

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return Ok(false);
    }

    tracing_log::LogTracer::init().map_err(|e| ConfigError::Logging(e.to_string()))?;
    Ok(true)
}
