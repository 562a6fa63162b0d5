//! Logging setup for the binary.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The fallback filter directive does not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    Filter {
        /// Rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Installs a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when the variable is unset or unparsable.
///
/// # Errors
///
/// Returns [`TelemetryError`] when `default_filter` is invalid or a
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|err| TelemetryError::Filter {
            filter: default_filter.to_owned(),
            reason: err.to_string(),
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| TelemetryError::Install(err.to_string()))
}
