//! Tracing initialization for embedders of the engine.
//!
//! Sets up the `tracing` subscriber with an environment-driven filter and
//! either human-readable or JSON output. Applications embedding the engine
//! that already install their own subscriber should skip this and let their
//! subscriber collect the engine's spans.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::EngineConfig;

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry-specific error type
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Initialize the tracing subscriber.
///
/// The filter is read from `RUST_LOG`, defaulting to `info`. Fails if a
/// global subscriber is already installed.
pub fn init_telemetry(config: &EngineConfig) -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::info!(
        service_name = %config.service_name,
        json_logs = config.json_logs,
        "Tracing initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_init_reports_error() {
        let config = EngineConfig::default();
        // First init may succeed or fail depending on test ordering; the
        // second must always report the already-installed subscriber.
        let _ = init_telemetry(&config);
        assert!(init_telemetry(&config).is_err());
    }
}
