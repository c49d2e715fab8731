//! # Controller configuration
//!
//! Process-wide settings loaded once from environment variables at boot,
//! mirroring the `ControllerConfig::from_env()` pattern this codebase already
//! uses for its other controllers.

use crate::constants::*;
use std::time::Duration;

/// Controller-level configuration.
///
/// All settings have defaults and can be overridden via environment
/// variables, typically populated from a ConfigMap via `envFrom`.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directories holding one Unix domain socket per provider plugin,
    /// searched in order; the first directory containing `<provider>.sock`
    /// wins.
    pub provider_socket_dirs: Vec<String>,
    /// Comma-separated audiences requested on every `TokenRequest`.
    pub token_request_audiences: Vec<String>,
    /// Maximum accepted `Mount` response size in bytes.
    pub max_rpc_response_bytes: usize,
    /// Reconciliation error requeue interval (seconds).
    pub reconciliation_error_requeue_secs: u64,
    /// Exponential backoff starting value (milliseconds).
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds).
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds).
    pub watch_restart_delay_secs: u64,
    /// Maximum concurrent reconciliations.
    pub max_concurrent_reconciliations: usize,
    /// Bind address for the operational HTTP server (`/healthz`, `/readyz`, `/metrics`).
    pub http_bind_addr: String,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE).
    pub log_level: String,
    /// Log format (json, text).
    pub log_format: String,
    /// Enable metrics collection.
    pub enable_metrics: bool,
    /// Enable leader election before starting the watch loop.
    pub leader_election_enabled: bool,
    /// Namespace holding the leader-election `Lease` object.
    pub leader_election_namespace: String,
    /// Name of the `Lease` object used for leader election.
    pub leader_election_lease_name: String,
    /// This process's own identity, used as the `Lease` holder identity and
    /// injected as `csi.storage.k8s.io/pod.*` attributes on every `Mount` call.
    pub pod_name: String,
    pub pod_uid: String,
    pub pod_namespace: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            provider_socket_dirs: vec!["/var/run/secrets-store-csi-providers".to_string()],
            token_request_audiences: Vec::new(),
            max_rpc_response_bytes: DEFAULT_MAX_RPC_RESPONSE_BYTES,
            reconciliation_error_requeue_secs: 30,
            backoff_start_ms: PLUGIN_RETRY_INITIAL_BACKOFF_MS,
            backoff_max_ms: PLUGIN_RETRY_MAX_BACKOFF_MS,
            watch_restart_delay_secs: 5,
            max_concurrent_reconciliations: 10,
            http_bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            enable_metrics: true,
            leader_election_enabled: false,
            leader_election_namespace: "kube-system".to_string(),
            leader_election_lease_name: "secret-sync-controller-leader".to_string(),
            pod_name: String::new(),
            pod_uid: String::new(),
            pod_namespace: String::new(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let audiences = std::env::var("TOKEN_REQUEST_AUDIENCES")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let provider_socket_dirs = std::env::var("PROVIDER_SOCKET_DIRS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|dirs: &Vec<String>| !dirs.is_empty())
            .unwrap_or_else(|| defaults.provider_socket_dirs.clone());

        Self {
            provider_socket_dirs,
            token_request_audiences: audiences,
            max_rpc_response_bytes: env_var_or_default(
                "MAX_RPC_RESPONSE_BYTES",
                defaults.max_rpc_response_bytes,
            ),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                defaults.reconciliation_error_requeue_secs,
            ),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", defaults.backoff_start_ms),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", defaults.backoff_max_ms),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            http_bind_addr: env_var_or_default_str("HTTP_BIND_ADDR", &defaults.http_bind_addr),
            log_level: env_var_or_default_str("LOG_LEVEL", &defaults.log_level),
            log_format: env_var_or_default_str("LOG_FORMAT", &defaults.log_format),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", defaults.enable_metrics),
            leader_election_enabled: env_var_or_default_bool(
                "LEADER_ELECTION_ENABLED",
                defaults.leader_election_enabled,
            ),
            leader_election_namespace: env_var_or_default_str(
                "LEADER_ELECTION_NAMESPACE",
                &defaults.leader_election_namespace,
            ),
            leader_election_lease_name: env_var_or_default_str(
                "LEADER_ELECTION_LEASE_NAME",
                &defaults.leader_election_lease_name,
            ),
            pod_name: env_var_or_default_str("POD_NAME", &defaults.pod_name),
            pod_uid: env_var_or_default_str("POD_UID", &defaults.pod_uid),
            pod_namespace: env_var_or_default_str("POD_NAMESPACE", &defaults.pod_namespace),
        }
    }

    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

/// Caller identity injected into every `Mount` call's attribute map.
/// Read once at process boot (Design Note "Global state" in `DESIGN.md`),
/// not re-read per reconcile.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub pod_name: String,
    pub pod_uid: String,
    pub pod_namespace: String,
}

impl From<&ControllerConfig> for CallerIdentity {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            pod_name: cfg.pod_name.clone(),
            pod_uid: cfg.pod_uid.clone(),
            pod_namespace: cfg.pod_namespace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ControllerConfig::default();
        assert!(cfg.max_rpc_response_bytes > 0);
        assert!(cfg.backoff_max_ms >= cfg.backoff_start_ms);
        assert!(!cfg.leader_election_enabled);
        assert!(!cfg.provider_socket_dirs.is_empty());
    }

    #[test]
    fn provider_socket_dirs_split_and_trim() {
        std::env::set_var("PROVIDER_SOCKET_DIRS", " /a , /b ,,/c");
        let cfg = ControllerConfig::from_env();
        assert_eq!(cfg.provider_socket_dirs, vec!["/a", "/b", "/c"]);
        std::env::remove_var("PROVIDER_SOCKET_DIRS");
    }

    #[test]
    fn token_audiences_split_and_trim() {
        std::env::set_var("TOKEN_REQUEST_AUDIENCES", " aud-a , aud-b ,,aud-c");
        let cfg = ControllerConfig::from_env();
        assert_eq!(cfg.token_request_audiences, vec!["aud-a", "aud-b", "aud-c"]);
        std::env::remove_var("TOKEN_REQUEST_AUDIENCES");
    }
}
