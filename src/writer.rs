//! # Writer
//!
//! Creates or updates the target Secret via server-side apply with a
//! dedicated field manager (§4.5). Uses strict field ownership: fields the
//! controller previously owned but dropped are removed; a force-apply
//! resolves conflicts on the controller's managed fields.

use crate::constants::{FIELD_MANAGER, MANAGED_SECRET_MARKER_KEY};
use crate::crd::SecretSync;
use crate::error::ReconcileError;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use std::collections::BTreeMap;

/// Build the target Secret for `ss`, without touching the API server. Pure
/// so the scenario-level invariants (owner ref, marker label, data keys) can
/// be checked directly.
#[must_use]
pub fn build_secret(ss: &SecretSync, data: &BTreeMap<String, Vec<u8>>) -> Secret {
    let namespace = ss.namespace().unwrap_or_else(|| "default".to_string());
    let name = ss.name_any();

    let mut labels = ss.spec.secret_object.labels.clone();
    labels.insert(MANAGED_SECRET_MARKER_KEY.to_string(), String::new());

    let owner_ref = OwnerReference {
        api_version: SecretSync::api_version(&()).to_string(),
        kind: SecretSync::kind(&()).to_string(),
        name: name.clone(),
        uid: ss.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    Secret {
        metadata: kube::api::ObjectMeta {
            name: Some(name),
            namespace: Some(namespace),
            labels: Some(labels),
            annotations: Some(ss.spec.secret_object.annotations.clone()),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        type_: Some(ss.spec.secret_object.r#type.clone()),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Apply the assembled data map onto the target Secret named after `ss`.
pub async fn apply_secret(
    client: Client,
    ss: &SecretSync,
    data: &BTreeMap<String, Vec<u8>>,
) -> Result<(), ReconcileError> {
    let namespace = ss.namespace().unwrap_or_else(|| "default".to_string());
    let name = ss.name_any();
    let secret = build_secret(ss, data);

    let api: Api<Secret> = Api::namespaced(client, &namespace);
    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&secret),
    )
    .await
    .map_err(|e| ReconcileError::ControllerPatchError {
        name: name.clone(),
        source: e.into(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{SecretObjectData, SecretObjectSpec, SecretSyncSpec};
    use kube::api::ObjectMeta;

    fn sample_ss() -> SecretSync {
        let mut ss = SecretSync::new(
            "s1",
            SecretSyncSpec {
                service_account_name: "sa".to_string(),
                secret_provider_class_name: "p".to_string(),
                secret_object: SecretObjectSpec {
                    r#type: "Opaque".to_string(),
                    labels: BTreeMap::new(),
                    annotations: BTreeMap::new(),
                    data: vec![SecretObjectData {
                        source_path: "foo".to_string(),
                        target_key: "bar".to_string(),
                    }],
                },
                force_synchronization: false,
            },
        );
        ss.metadata = ObjectMeta {
            name: Some("s1".to_string()),
            namespace: Some("n".to_string()),
            uid: Some("11111111-1111-1111-1111-111111111111".to_string()),
            ..Default::default()
        };
        ss
    }

    #[test]
    fn carries_exactly_one_owner_reference_matching_the_secret_sync() {
        let ss = sample_ss();
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());

        let secret = build_secret(&ss, &data);
        let owners = secret.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].name, "s1");
        assert_eq!(owners[0].uid, "11111111-1111-1111-1111-111111111111");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn carries_the_marker_label_with_empty_value() {
        let ss = sample_ss();
        let secret = build_secret(&ss, &BTreeMap::new());
        let labels = secret.metadata.labels.unwrap();
        assert_eq!(
            labels.get(MANAGED_SECRET_MARKER_KEY),
            Some(&String::new())
        );
    }

    #[test]
    fn data_keys_match_the_declared_target_keys() {
        let ss = sample_ss();
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());

        let secret = build_secret(&ss, &data);
        let keys: Vec<&String> = secret.data.as_ref().unwrap().keys().collect();
        assert_eq!(keys, vec!["bar"]);
    }
}
