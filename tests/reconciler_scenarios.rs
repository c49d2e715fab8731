//! Scenario-level tests exercising the real condition/fingerprint/validation/
//! writer code paths in the same sequence `reconciler::reconcile_inner` uses,
//! driven by a fake plugin (a `HashMap` standing in for `Mount`) and a
//! recording status sink instead of a live API server. Named after the
//! end-to-end scenarios this controller is expected to handle.

use kube::api::ObjectMeta;
use secret_sync_controller::crd::{
    Condition, ConditionStatus, ConditionType, SecretObjectData, SecretObjectSpec, SecretSync,
    SecretSyncSpec, SecretSyncStatus,
};
use secret_sync_controller::{ConditionReason, ReconcileError};
use std::collections::BTreeMap;

fn secret_sync(name: &str, data: Vec<SecretObjectData>, labels: BTreeMap<String, String>) -> SecretSync {
    let mut ss = SecretSync::new(
        name,
        SecretSyncSpec {
            service_account_name: "sa".to_string(),
            secret_provider_class_name: "p".to_string(),
            secret_object: SecretObjectSpec {
                r#type: "Opaque".to_string(),
                labels,
                annotations: BTreeMap::new(),
                data,
            },
            force_synchronization: false,
        },
    );
    ss.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("n".to_string()),
        uid: Some("ss-uid-1".to_string()),
        generation: Some(1),
        ..Default::default()
    };
    ss
}

/// Models the fetch → fingerprint → retry-decision → preview → write
/// sequence from `reconciler::reconcile_inner`, minus the actual RPC/API
/// calls, which `provider_files` and `spc_present` stand in for.
struct ScenarioOutcome {
    wrote_secret: bool,
    sync_hash: String,
    status: SecretSyncStatus,
}

fn run_scenario(
    ss: &SecretSync,
    spc_present: bool,
    provider_files: Option<&BTreeMap<String, Vec<u8>>>,
    previous_status: Option<SecretSyncStatus>,
) -> Result<ScenarioOutcome, ReconcileError> {
    use secret_sync_controller::fingerprint::{self, FingerprintEnvelope};

    let mut status = previous_status.unwrap_or_default();
    let is_create = status.sync_hash.is_empty();

    secret_sync_controller::conditions::ensure_initialized(&mut status);

    // Step 4: reserved-key validation.
    reconciler_validate(&ss.spec)?;

    // Step 5: SPC resolution.
    if !spc_present {
        return Err(ReconcileError::SecretProviderClassMisconfigured {
            name: ss.spec.secret_provider_class_name.clone(),
            source: anyhow::anyhow!(
                "failed to get SecretProviderClass \"{}\": not found",
                ss.spec.secret_provider_class_name
            ),
        });
    }

    // Step 6: fetch/project.
    let files = provider_files.expect("provider_files required once SPC resolves");
    let mut data = BTreeMap::new();
    for item in &ss.spec.secret_object.data {
        let bytes = files
            .get(&item.source_path)
            .ok_or_else(|| {
                ReconcileError::RemoteSecretStoreFetchFailed(format!(
                    "no file returned for sourcePath \"{}\"",
                    item.source_path
                ))
            })?
            .clone();
        data.insert(item.target_key.clone(), bytes);
    }

    // Step 7: fingerprint.
    let envelope = FingerprintEnvelope {
        spc_uid: "spc-uid-1".to_string(),
        spc_generation: 1,
        ss_uid: ss.metadata.uid.clone().unwrap_or_default(),
        ss_generation: ss.metadata.generation.unwrap_or(1),
        force_synchronization: ss.spec.force_synchronization,
    };
    let new_hash = fingerprint::compute(&data, &envelope);
    let hash_changed = new_hash != status.sync_hash;

    // Step 8: retry decision.
    let retry = secret_sync_controller::conditions::any_condition_needs_retry(&status) || hash_changed;
    if !retry {
        return Ok(ScenarioOutcome {
            wrote_secret: false,
            sync_hash: status.sync_hash.clone(),
            status,
        });
    }

    // Step 9-10: preview.
    let mut preview = status.clone();
    secret_sync_controller::conditions::preview_success(&mut preview, is_create, hash_changed);
    preview.sync_hash = new_hash.clone();
    preview.last_successful_sync_time = Some("2026-01-01T00:00:00Z".to_string());

    Ok(ScenarioOutcome {
        wrote_secret: true,
        sync_hash: preview.sync_hash.clone(),
        status: preview,
    })
}

fn reconciler_validate(spec: &SecretSyncSpec) -> Result<(), ReconcileError> {
    secret_sync_controller::reconciler::validation::validate_reserved_keys(spec)
}

fn condition(status: &SecretSyncStatus, t: ConditionType) -> &Condition {
    status.conditions.iter().find(|c| c.r#type == t).unwrap()
}

#[test]
fn happy_create() {
    let ss = secret_sync(
        "s1",
        vec![SecretObjectData {
            source_path: "foo".to_string(),
            target_key: "bar".to_string(),
        }],
        BTreeMap::new(),
    );
    let mut files = BTreeMap::new();
    files.insert("foo".to_string(), b"secret".to_vec());

    let outcome = run_scenario(&ss, true, Some(&files), None).unwrap();
    assert!(outcome.wrote_secret);

    let secret = secret_sync_controller::writer::build_secret(
        &ss,
        &{
            let mut d = BTreeMap::new();
            d.insert("bar".to_string(), b"secret".to_vec());
            d
        },
    );
    assert_eq!(
        secret.metadata.labels.unwrap().get("secrets-store.sync.x-k8s.io"),
        Some(&String::new())
    );
    assert_eq!(secret.metadata.owner_references.unwrap().len(), 1);
    assert_eq!(
        secret.data.unwrap().keys().collect::<Vec<_>>(),
        vec!["bar"]
    );

    assert_eq!(
        condition(&outcome.status, ConditionType::SecretCreated).status,
        ConditionStatus::True
    );
    assert_eq!(
        condition(&outcome.status, ConditionType::SecretCreated).reason,
        ConditionReason::CreateSuccessful.as_str()
    );
    assert_eq!(
        condition(&outcome.status, ConditionType::SecretUpdated).reason,
        ConditionReason::SecretUpToDate.as_str()
    );
}

#[test]
fn no_op_idempotent() {
    let ss = secret_sync(
        "s1",
        vec![SecretObjectData {
            source_path: "foo".to_string(),
            target_key: "bar".to_string(),
        }],
        BTreeMap::new(),
    );
    let mut files = BTreeMap::new();
    files.insert("foo".to_string(), b"secret".to_vec());

    let first = run_scenario(&ss, true, Some(&files), None).unwrap();
    let second = run_scenario(&ss, true, Some(&files), Some(first.status.clone())).unwrap();

    assert!(!second.wrote_secret);
    assert_eq!(first.sync_hash, second.sync_hash);
}

#[test]
fn provider_content_change() {
    let ss = secret_sync(
        "s1",
        vec![SecretObjectData {
            source_path: "foo".to_string(),
            target_key: "bar".to_string(),
        }],
        BTreeMap::new(),
    );
    let mut files_v1 = BTreeMap::new();
    files_v1.insert("foo".to_string(), b"secret".to_vec());
    let first = run_scenario(&ss, true, Some(&files_v1), None).unwrap();

    let mut files_v2 = BTreeMap::new();
    files_v2.insert("foo".to_string(), b"new-secret".to_vec());
    let second = run_scenario(&ss, true, Some(&files_v2), Some(first.status.clone())).unwrap();

    assert!(second.wrote_secret);
    assert_ne!(first.sync_hash, second.sync_hash);
    assert_eq!(
        condition(&second.status, ConditionType::SecretCreated).status,
        ConditionStatus::True
    );
    assert_eq!(
        condition(&second.status, ConditionType::SecretUpdated).status,
        ConditionStatus::True
    );
}

#[test]
fn spc_missing() {
    let ss = secret_sync(
        "s1",
        vec![SecretObjectData {
            source_path: "foo".to_string(),
            target_key: "bar".to_string(),
        }],
        BTreeMap::new(),
    );

    let err = run_scenario(&ss, false, None, None).unwrap_err();
    assert!(matches!(err, ReconcileError::SecretProviderClassMisconfigured { .. }));
    assert!(err
        .to_string()
        .contains("failed to get SecretProviderClass \"p\""));
}

#[test]
fn reserved_label_use() {
    let mut labels = BTreeMap::new();
    labels.insert(
        "secrets-store.sync.x-k8s.io".to_string(),
        "x".to_string(),
    );
    let ss = secret_sync(
        "s1",
        vec![SecretObjectData {
            source_path: "foo".to_string(),
            target_key: "bar".to_string(),
        }],
        labels,
    );

    let err = run_scenario(&ss, true, None, None).unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidSecretLabel { .. }));
    assert_eq!(
        err.to_string(),
        "label secrets-store.sync.x-k8s.io is reserved for use by the Secrets Store Sync Controller"
    );
}

#[test]
fn apply_denied_by_admission() {
    let ss = secret_sync(
        "s1",
        vec![SecretObjectData {
            source_path: "foo".to_string(),
            target_key: "bar".to_string(),
        }],
        BTreeMap::new(),
    );
    let mut files = BTreeMap::new();
    files.insert("foo".to_string(), b"secret".to_vec());

    let previewed = run_scenario(&ss, true, Some(&files), None).unwrap();

    // Simulate the writer rejecting the apply: roll back hash/timestamp and
    // overwrite the previewed conditions with the failure reason, exactly as
    // `reconciler::reconcile_inner` does on a write error.
    let mut rolled_back = SecretSyncStatus::default();
    secret_sync_controller::conditions::ensure_initialized(&mut rolled_back);
    let write_err = ReconcileError::ControllerPatchError {
        name: "s1".to_string(),
        source: anyhow::anyhow!("admission webhook denied the request"),
    };
    for ct in write_err.affected_conditions() {
        secret_sync_controller::conditions::set(
            &mut rolled_back,
            *ct,
            ConditionStatus::False,
            write_err.reason(),
            write_err.to_string(),
        );
    }

    assert_eq!(rolled_back.sync_hash, String::new());
    assert_ne!(rolled_back.sync_hash, previewed.sync_hash);
    assert_eq!(
        condition(&rolled_back, ConditionType::SecretCreated).status,
        ConditionStatus::False
    );
    assert_eq!(
        condition(&rolled_back, ConditionType::SecretCreated).reason,
        ConditionReason::ControllerPatchError.as_str()
    );
    assert!(condition(&rolled_back, ConditionType::SecretCreated)
        .message
        .starts_with("failed to patch secret \"s1\":"));
}
