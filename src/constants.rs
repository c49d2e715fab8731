//! # Constants
//!
//! Wire-contract and default-value constants. Keep literal strings that
//! appear in condition reasons, attribute keys, or CLI-visible messages
//! here so they are defined exactly once.

/// Reserved label/annotation key. Its value on managed Secrets is always the
/// empty string; the same key in user-declared labels/annotations is a
/// validation error.
pub const MANAGED_SECRET_MARKER_KEY: &str = "secrets-store.sync.x-k8s.io";

/// Field manager name used for the server-side apply patch onto target
/// Secrets.
pub const FIELD_MANAGER: &str = "secrets-store-sync-controller";

/// Event broadcaster component tag.
pub const EVENT_COMPONENT: &str = "secret-sync-controller";

/// Provider attribute keys injected by the controller (contractual, verbatim).
pub const ATTR_POD_NAME: &str = "csi.storage.k8s.io/pod.name";
pub const ATTR_POD_UID: &str = "csi.storage.k8s.io/pod.uid";
pub const ATTR_POD_NAMESPACE: &str = "csi.storage.k8s.io/pod.namespace";
pub const ATTR_SERVICE_ACCOUNT_NAME: &str = "csi.storage.k8s.io/serviceAccount.name";
pub const ATTR_SERVICE_ACCOUNT_TOKENS: &str = "csi.storage.k8s.io/serviceAccount.tokens";

/// Secret type string that triggers the TLS split transform.
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";
pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY: &str = "tls.key";

/// Mount RPC fixed parameters. The controller never mounts a filesystem; the
/// target path is unused by design but required by the wire contract.
pub const MOUNT_TARGET_PATH: &str = "/mnt/secrets-store";
pub const MOUNT_PERMISSION_OCTAL: &str = "420";

/// Token cache tuning (spec §4.1 / §3 Token cache entry).
pub const TOKEN_REQUEST_EXPIRATION_SECS: i64 = 600;
pub const TOKEN_REFRESH_MIN_JITTER_SECS: i64 = 10;
pub const TOKEN_MAX_AGE_HOURS: i64 = 24;
pub const TOKEN_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Plugin transport defaults (spec §4.2 / §6).
pub const DEFAULT_MAX_RPC_RESPONSE_BYTES: usize = 4 * 1024 * 1024;
pub const MOUNT_RESPONSE_WARN_BYTES: usize = 1024 * 1024;
pub const PLUGIN_NAME_PATTERN: &str = r"^[A-Za-z0-9_-]{0,30}$";
pub const PLUGIN_RETRY_INITIAL_BACKOFF_MS: u64 = 1000;
pub const PLUGIN_RETRY_MAX_BACKOFF_MS: u64 = 10_000;
pub const PLUGIN_RETRY_MULTIPLIER: f64 = 1.1;
pub const PLUGIN_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const PLUGIN_HEALTH_PROBE_TIMEOUT_SECS: u64 = 5;

/// Leader election defaults (spec §5).
pub const LEASE_DURATION_SECS: u64 = 15;
pub const LEASE_RENEW_SECS: u64 = 10;
pub const LEASE_RETRY_SECS: u64 = 2;

/// Shutdown grace period for draining in-flight work (spec §5).
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// Read an environment variable or fall back to a parsed default.
pub fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read a boolean environment variable or fall back to a default.
pub fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v = v.to_lowercase();
            v == "true" || v == "1" || v == "yes" || v == "on"
        })
        .unwrap_or(default)
}

/// Read a string environment variable or fall back to a default.
pub fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
