//! # Token cache
//!
//! Caches per-(namespace, service-account, audiences, expiration, bound
//! object) short-lived identity tokens. Refreshes ahead of expiry with
//! jitter; a concurrent miss racing another is acceptable (§4.1).

use crate::constants::{
    TOKEN_CACHE_SWEEP_INTERVAL_SECS, TOKEN_MAX_AGE_HOURS, TOKEN_REFRESH_MIN_JITTER_SECS,
    TOKEN_REQUEST_EXPIRATION_SECS,
};
use crate::observability::metrics;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, PostParams};
use kube::Client;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Cache key. Audiences are kept sorted so equal sets hash/compare equal
/// regardless of request order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenCacheKey {
    pub namespace: String,
    pub service_account: String,
    pub audiences: Vec<String>,
    pub expiration_seconds: i64,
    pub bound_object_ref: Option<String>,
}

impl TokenCacheKey {
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        service_account: impl Into<String>,
        mut audiences: Vec<String>,
        expiration_seconds: i64,
        bound_object_ref: Option<String>,
    ) -> Self {
        audiences.sort();
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
            audiences,
            expiration_seconds,
            bound_object_ref,
        }
    }

    fn jitter_seconds(&self) -> i64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        (hasher.finish() % (TOKEN_REFRESH_MIN_JITTER_SECS as u64 + 1)) as i64
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expiration_timestamp: DateTime<Utc>,
    issued_at: DateTime<Utc>,
}

/// Reader/writer-locked token cache. Read path (cache hit, no refresh
/// needed) never takes the write lock.
pub struct TokenCache {
    client: Client,
    entries: RwLock<HashMap<TokenCacheKey, CachedToken>>,
}

impl TokenCache {
    #[must_use]
    pub fn new(client: Client) -> Arc<Self> {
        Arc::new(Self {
            client,
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Return a valid token for `key`, refreshing if within the refresh
    /// window. On refresh failure with a still-valid cached token, logs and
    /// returns the stale-but-valid token; otherwise surfaces the error.
    pub async fn get_token(&self, key: &TokenCacheKey) -> Result<String> {
        self.get_token_entry(key).await.map(|c| c.token)
    }

    async fn get_token_entry(&self, key: &TokenCacheKey) -> Result<CachedToken> {
        if let Some(cached) = self.entries.read().await.get(key).cloned() {
            if !self.needs_refresh(&cached, key) {
                metrics::record_token_cache_hit();
                return Ok(cached);
            }
            match self.request_token(key).await {
                Ok(fresh) => {
                    self.entries.write().await.insert(key.clone(), fresh.clone());
                    return Ok(fresh);
                }
                Err(e) => {
                    if cached.expiration_timestamp > Utc::now() {
                        warn!(error = %e, "token refresh failed, using still-valid cached token");
                        metrics::record_token_cache_refresh_error();
                        return Ok(cached);
                    }
                    metrics::record_token_cache_refresh_error();
                    return Err(e);
                }
            }
        }

        metrics::record_token_cache_miss();
        let fresh = self.request_token(key).await?;
        self.entries.write().await.insert(key.clone(), fresh.clone());
        Ok(fresh)
    }

    fn needs_refresh(&self, cached: &CachedToken, key: &TokenCacheKey) -> bool {
        let now = Utc::now();
        let jitter = chrono::Duration::seconds(key.jitter_seconds());
        let refresh_window_secs =
            std::cmp::max((key.expiration_seconds as f64 * 0.2) as i64, TOKEN_REFRESH_MIN_JITTER_SECS);
        let refresh_at = cached.expiration_timestamp - chrono::Duration::seconds(refresh_window_secs) - jitter;
        let max_age_cutoff =
            cached.issued_at + chrono::Duration::hours(TOKEN_MAX_AGE_HOURS) - jitter;
        now > refresh_at || now > max_age_cutoff
    }

    async fn request_token(&self, key: &TokenCacheKey) -> Result<CachedToken> {
        let sa_api: Api<ServiceAccount> =
            Api::namespaced(self.client.clone(), &key.namespace);
        let tr = TokenRequest {
            spec: TokenRequestSpec {
                audiences: key.audiences.clone(),
                expiration_seconds: Some(key.expiration_seconds),
                bound_object_ref: None,
            },
            ..Default::default()
        };
        let body = serde_json::to_vec(&tr).context("marshaling TokenRequest")?;
        let response: TokenRequest = sa_api
            .create_subresource("token", &key.service_account, &PostParams::default(), body)
            .await
            .context("TokenRequest endpoint not enabled")?;

        let status = response
            .status
            .ok_or_else(|| anyhow!("TokenRequest response missing status"))?;
        let expiration_timestamp = DateTime::parse_from_rfc3339(&status.expiration_timestamp.0.to_rfc3339())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now() + chrono::Duration::seconds(key.expiration_seconds));

        debug!(namespace = %key.namespace, sa = %key.service_account, "issued fresh identity token");

        Ok(CachedToken {
            token: status.token,
            expiration_timestamp,
            issued_at: Utc::now(),
        })
    }

    /// Remove any entry whose expiration has already passed. Should be
    /// driven by a periodic task at most every 60s (§4.1).
    pub async fn sweep(&self) {
        let now = Utc::now();
        self.entries.write().await.retain(|_, v| v.expiration_timestamp > now);
    }

    /// Spawn the background sweep task. Intended to run for the lifetime of
    /// the process.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(TOKEN_CACHE_SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                cache.sweep().await;
            }
        });
    }

    /// Build the provider attribute bundle described in §6: a JSON object
    /// keyed by audience with `{token, expirationTimestamp}` values,
    /// serialized to a single string. Empty audiences yields an empty
    /// object, not an error.
    pub async fn build_provider_token_attrs(
        &self,
        namespace: &str,
        service_account: &str,
        audiences: &[String],
    ) -> Result<String> {
        let mut bundle = serde_json::Map::new();
        for audience in audiences {
            let key = TokenCacheKey::new(
                namespace,
                service_account,
                vec![audience.clone()],
                TOKEN_REQUEST_EXPIRATION_SECS,
                None,
            );
            let cached = self.get_token_entry(&key).await?;
            bundle.insert(
                audience.clone(),
                serde_json::json!({
                    "token": cached.token,
                    "expirationTimestamp": cached.expiration_timestamp.to_rfc3339(),
                }),
            );
        }
        serde_json::to_string(&serde_json::Value::Object(bundle)).context("serializing token attrs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_ignores_audience_order() {
        let a = TokenCacheKey::new("n", "sa", vec!["x".into(), "y".into()], 600, None);
        let b = TokenCacheKey::new("n", "sa", vec!["y".into(), "x".into()], 600, None);
        assert_eq!(a, b);
    }

    #[test]
    fn jitter_is_deterministic_for_same_key() {
        let a = TokenCacheKey::new("n", "sa", vec!["x".into()], 600, None);
        let b = TokenCacheKey::new("n", "sa", vec!["x".into()], 600, None);
        assert_eq!(a.jitter_seconds(), b.jitter_seconds());
        assert!(a.jitter_seconds() <= TOKEN_REFRESH_MIN_JITTER_SECS);
    }
}
