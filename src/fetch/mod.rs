//! # Content fetcher
//!
//! Orchestrates the token cache and plugin pool to produce a
//! `targetKey → bytes` map for a `SecretSync` + `SecretProviderClass` pair
//! (§4.3).

use crate::config::CallerIdentity;
use crate::constants::{
    ATTR_POD_NAME, ATTR_POD_NAMESPACE, ATTR_POD_UID, ATTR_SERVICE_ACCOUNT_NAME,
    ATTR_SERVICE_ACCOUNT_TOKENS, SECRET_TYPE_TLS,
};
use crate::crd::{SecretProviderClass, SecretSync};
use crate::error::ReconcileError;
use crate::identity::{TokenCache, TokenCacheKey};
use crate::plugin::PluginPool;
use crate::tls;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Produce the assembled data map for `ss` against `spc`.
pub async fn fetch(
    ss: &SecretSync,
    spc: &SecretProviderClass,
    identity: &CallerIdentity,
    token_audiences: &[String],
    token_cache: &Arc<TokenCache>,
    plugin_pool: &Arc<PluginPool>,
) -> Result<BTreeMap<String, Vec<u8>>, ReconcileError> {
    let mut client = plugin_pool.client_for(&spc.spec.provider).await?;

    let namespace = ss
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());

    let mut attributes = spc.spec.parameters.clone();
    attributes.insert(
        ATTR_POD_NAME.to_string(),
        serde_json::Value::String(identity.pod_name.clone()),
    );
    attributes.insert(
        ATTR_POD_UID.to_string(),
        serde_json::Value::String(identity.pod_uid.clone()),
    );
    attributes.insert(
        ATTR_POD_NAMESPACE.to_string(),
        serde_json::Value::String(namespace.clone()),
    );
    attributes.insert(
        ATTR_SERVICE_ACCOUNT_NAME.to_string(),
        serde_json::Value::String(ss.spec.service_account_name.clone()),
    );

    if !token_audiences.is_empty() {
        let token_attrs = token_cache
            .build_provider_token_attrs(&namespace, &ss.spec.service_account_name, token_audiences)
            .await
            .map_err(ReconcileError::ControllerSyncError)?;
        attributes.insert(
            ATTR_SERVICE_ACCOUNT_TOKENS.to_string(),
            serde_json::Value::String(token_attrs),
        );
    }

    let attributes_json = serde_json::to_string(&attributes)
        .map_err(|e| ReconcileError::ControllerSyncError(e.into()))?;

    let outcome = client.mount(&attributes_json).await?;

    let is_tls = ss.spec.secret_object.r#type == SECRET_TYPE_TLS;
    let mut data = BTreeMap::new();
    for entry in &ss.spec.secret_object.data {
        if entry.source_path.is_empty() || entry.target_key.is_empty() {
            return Err(ReconcileError::RemoteSecretStoreFetchFailed(
                "data entry has an empty sourcePath or targetKey".to_string(),
            ));
        }

        let raw = outcome.files.get(&entry.source_path).ok_or_else(|| {
            ReconcileError::RemoteSecretStoreFetchFailed(format!(
                "provider response is missing file {:?}",
                entry.source_path
            ))
        })?;

        let value = if is_tls {
            tls::transform(&entry.target_key, raw)?
        } else {
            raw.clone()
        };

        data.insert(entry.target_key.clone(), value);
    }

    Ok(data)
}

/// Token cache key for the set of audiences this controller requests on
/// behalf of a `SecretSync`'s service account.
#[must_use]
pub fn token_cache_key(ss: &SecretSync, audiences: &[String]) -> TokenCacheKey {
    let namespace = ss
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    TokenCacheKey::new(
        namespace,
        ss.spec.service_account_name.clone(),
        audiences.to_vec(),
        crate::constants::TOKEN_REQUEST_EXPIRATION_SECS,
        None,
    )
}
