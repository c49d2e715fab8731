//! # SecretSync
//!
//! A `SecretSync` is a declarative request to materialize a Secret from an
//! external store referenced by a [`SecretProviderClass`](super::SecretProviderClass).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `SecretSync` custom resource.
///
/// # Example
///
/// ```yaml
/// apiVersion: secret-sync.x-k8s.io/v1alpha1
/// kind: SecretSync
/// metadata:
///   name: s1
///   namespace: n
/// spec:
///   serviceAccountName: my-sa
///   secretProviderClassName: p
///   secretObject:
///     type: Opaque
///     data:
///       - sourcePath: foo
///         targetKey: bar
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secret-sync.x-k8s.io",
    version = "v1alpha1",
    kind = "SecretSync",
    namespaced,
    status = "SecretSyncStatus",
    printcolumn = r#"{"name":"SyncHash", "type":"string", "jsonPath":".status.syncHash"}"#,
    printcolumn = r#"{"name":"LastSync", "type":"string", "jsonPath":".status.lastSuccessfulSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretSyncSpec {
    /// Service account used to request identity tokens handed to the
    /// provider plugin (see `identity::token_cache`).
    pub service_account_name: String,
    /// Name of the `SecretProviderClass` in the same namespace.
    pub secret_provider_class_name: String,
    /// Description of the Secret to materialize.
    pub secret_object: SecretObjectSpec,
    /// Forces a re-fingerprint/re-apply even if nothing else changed.
    #[serde(default)]
    pub force_synchronization: bool,
}

/// Projection of provider-fetched files onto a native Secret.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretObjectSpec {
    /// Kubernetes Secret `type`, e.g. `Opaque` or `kubernetes.io/tls`.
    pub r#type: String,
    /// User-declared labels. Must not contain the reserved marker key.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// User-declared annotations. Must not contain the reserved marker key.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Source-to-target key projections.
    pub data: Vec<SecretObjectData>,
}

/// One source path -> target Secret data key projection.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretObjectData {
    /// Path reported by the provider plugin's `Mount` response file list.
    pub source_path: String,
    /// Key under which the fetched bytes are stored in the target Secret.
    pub target_key: String,
}
