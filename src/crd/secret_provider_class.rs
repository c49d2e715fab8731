//! # SecretProviderClass
//!
//! An external-store descriptor, read-only to this controller. Parameters
//! are intentionally schema-less (each provider plugin defines its own
//! attribute set); the typed wrapper lives at the cache-read boundary only,
//! per the "Dynamic types" design note in `SPEC_FULL.md`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `SecretProviderClass` custom resource. Created externally (e.g. by a
/// platform team); this controller never writes it.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "secret-sync.x-k8s.io",
    version = "v1alpha1",
    kind = "SecretProviderClass",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SecretProviderClassSpec {
    /// Provider plugin name; resolved to `<dir>/<provider>.sock`.
    pub provider: String,
    /// Provider-defined attributes, passed through to the plugin verbatim
    /// plus the caller-identity and token hints this controller injects.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}
