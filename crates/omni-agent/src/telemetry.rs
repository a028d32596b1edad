//! Structured logging setup.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human-readable output for local runs
    Pretty,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Tracing subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if a subscriber is already installed; callers that may run more
/// than once can ignore the error.
pub fn init_tracing(format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };
    installed.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(?format, "Initialized structured tracing");
    Ok(())
}
