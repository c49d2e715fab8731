//! # Logging init
//!
//! Installs a global `tracing` subscriber. Falls back to a permissive
//! `info`-level text subscriber if env-filter construction fails, so a bad
//! `LOG_LEVEL` value never prevents the controller from starting.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber per `log_level`/`log_format`.
pub fn init(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if log_format == "json" {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_target(true)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    if result.is_err() {
        let _ = fmt().with_env_filter(EnvFilter::new("info")).try_init();
        tracing::warn!("failed to install requested tracing subscriber, using default");
    }
}
