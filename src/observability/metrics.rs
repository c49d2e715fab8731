//! # Metrics
//!
//! Prometheus metrics for the SecretSync controller.
//!
//! ## Metrics Exposed
//!
//! - `secretsync_reconciliations_total` - Total number of reconciliations
//! - `secretsync_reconciliation_errors_total` - Reconciliation errors by reason
//! - `secretsync_reconciliation_duration_seconds` - Duration of a full reconcile
//! - `secretsync_secrets_created_total` - Secrets created
//! - `secretsync_secrets_updated_total` - Secrets updated in place
//! - `secretsync_token_cache_hits_total` / `_misses_total` / `_refresh_errors_total`
//! - `secretsync_plugin_rpc_duration_seconds` - Plugin `Mount`/`Version` RPC duration

use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secretsync_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("failed to create RECONCILIATIONS_TOTAL metric")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secretsync_reconciliation_errors_total",
            "Total number of reconciliation errors by classified reason",
        ),
        &["reason"],
    )
    .expect("failed to create RECONCILIATION_ERRORS_TOTAL metric")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "secretsync_reconciliation_duration_seconds",
            "Duration of a reconcile call in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("failed to create RECONCILIATION_DURATION metric")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secretsync_secrets_created_total",
        "Total number of Secrets created by the controller",
    )
    .expect("failed to create SECRETS_CREATED_TOTAL metric")
});

static SECRETS_UPDATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secretsync_secrets_updated_total",
        "Total number of Secrets updated in place by the controller",
    )
    .expect("failed to create SECRETS_UPDATED_TOTAL metric")
});

static TOKEN_CACHE_HITS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secretsync_token_cache_hits_total",
        "Total number of token cache hits",
    )
    .expect("failed to create TOKEN_CACHE_HITS_TOTAL metric")
});

static TOKEN_CACHE_MISSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secretsync_token_cache_misses_total",
        "Total number of token cache misses",
    )
    .expect("failed to create TOKEN_CACHE_MISSES_TOTAL metric")
});

static TOKEN_CACHE_REFRESH_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secretsync_token_cache_refresh_errors_total",
        "Total number of TokenRequest refresh errors",
    )
    .expect("failed to create TOKEN_CACHE_REFRESH_ERRORS_TOTAL metric")
});

static PLUGIN_RPC_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "secretsync_plugin_rpc_duration_seconds",
            "Duration of a plugin RPC call in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["provider", "rpc"],
    )
    .expect("failed to create PLUGIN_RPC_DURATION metric")
});

static PLUGIN_RPC_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secretsync_plugin_rpc_errors_total",
            "Total number of plugin RPC errors",
        ),
        &["provider", "rpc"],
    )
    .expect("failed to create PLUGIN_RPC_ERRORS_TOTAL metric")
});

/// Register every metric family with the global registry. Call once at
/// process boot before starting the HTTP server.
pub fn register_metrics() -> anyhow::Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_CACHE_REFRESH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PLUGIN_RPC_DURATION.clone()))?;
    REGISTRY.register(Box::new(PLUGIN_RPC_ERRORS_TOTAL.clone()))?;
    Ok(())
}

pub fn record_reconciliation_start() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn record_reconciliation_error(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(seconds: f64) {
    RECONCILIATION_DURATION.observe(seconds);
}

pub fn record_secret_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn record_secret_updated() {
    SECRETS_UPDATED_TOTAL.inc();
}

pub fn record_token_cache_hit() {
    TOKEN_CACHE_HITS_TOTAL.inc();
}

pub fn record_token_cache_miss() {
    TOKEN_CACHE_MISSES_TOTAL.inc();
}

pub fn record_token_cache_refresh_error() {
    TOKEN_CACHE_REFRESH_ERRORS_TOTAL.inc();
}

pub fn observe_plugin_rpc_duration(provider: &str, rpc: &str, seconds: f64) {
    PLUGIN_RPC_DURATION.with_label_values(&[provider, rpc]).observe(seconds);
}

pub fn record_plugin_rpc_error(provider: &str, rpc: &str) {
    PLUGIN_RPC_ERRORS_TOTAL.with_label_values(&[provider, rpc]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_metrics_is_idempotent_safe_on_first_call() {
        // A fresh REGISTRY in a separate process would register cleanly;
        // here we only check that recording functions don't panic pre-registration.
        record_reconciliation_start();
        record_reconciliation_error("plugin_unavailable");
        observe_reconciliation_duration(0.5);
        record_secret_created();
        record_secret_updated();
        record_token_cache_hit();
        record_token_cache_miss();
        record_token_cache_refresh_error();
        observe_plugin_rpc_duration("vault", "Mount", 0.2);
        record_plugin_rpc_error("vault", "Mount");
    }
}
