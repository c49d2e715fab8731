//! # Reconciler
//!
//! The state machine that glues the token cache, plugin pool, content
//! fetcher, fingerprint engine, writer, and condition manager together
//! (§4.8). Consumes work items from `kube::runtime::Controller`'s
//! rate-limited queue.

pub mod validation;

use crate::backoff::ExponentialBackoff;
use crate::conditions;
use crate::config::{CallerIdentity, ControllerConfig};
use crate::constants::EVENT_COMPONENT;
use crate::crd::{ConditionStatus, ConditionType, SecretProviderClass, SecretSync};
use crate::error::{ConditionReason, ReconcileError};
use crate::fetch;
use crate::fingerprint::{self, FingerprintEnvelope};
use crate::identity::TokenCache;
use crate::observability::metrics;
use crate::plugin::PluginPool;
use crate::writer;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What triggered this work item's enqueue. Carried only for logging; the
/// reconciler's behavior never branches on it (§9 "Rate limiting" keeps
/// per-item backoff out of the reconciler itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    SecretSyncChange,
    SecretProviderClassChange,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::SecretSyncChange => "secret-sync-change",
            TriggerSource::SecretProviderClassChange => "secret-provider-class-change",
        }
    }
}

#[derive(Debug)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u64,
}

impl BackoffState {
    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared reconciler context, injected into every `reconcile` call by the
/// `kube::runtime::Controller`.
pub struct ReconcilerContext {
    pub client: Client,
    pub config: ControllerConfig,
    pub identity: CallerIdentity,
    pub token_cache: Arc<TokenCache>,
    pub plugin_pool: Arc<PluginPool>,
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

/// Entry point invoked by `Controller::run`. `trigger_source` only affects
/// logging and event text.
pub async fn reconcile(
    ss: Arc<SecretSync>,
    ctx: Arc<ReconcilerContext>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = ss.name_any();
    let namespace = ss.namespace().unwrap_or_else(|| "default".to_string());

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
    );
    let _guard = span.enter();

    metrics::record_reconciliation_start();
    info!("reconciling SecretSync");

    let result = reconcile_inner(&ss, &ctx).await;

    let elapsed = start.elapsed().as_secs_f64();
    metrics::observe_reconciliation_duration(elapsed);

    if let Err(e) = &result {
        metrics::record_reconciliation_error(e.reason().as_str());
        emit_event(&ctx.client, &ss, EventType::Warning, e.reason().as_str(), &e.to_string()).await;
    }

    result
}

async fn reconcile_inner(
    ss: &SecretSync,
    ctx: &ReconcilerContext,
) -> Result<Action, ReconcileError> {
    let api: Api<SecretSync> = Api::namespaced(
        ctx.client.clone(),
        &ss.namespace().unwrap_or_else(|| "default".to_string()),
    );
    let name = ss.name_any();

    // Step 2: phase.
    let mut status = ss.status.clone().unwrap_or_default();
    let is_create = status.sync_hash.is_empty();

    // Step 3: initialize conditions if needed and persist immediately.
    if conditions::ensure_initialized(&mut status) {
        persist_status(&api, &name, &status).await?;
    }

    // Step 4: reserved-key validation.
    if let Err(e) = validation::validate_reserved_keys(&ss.spec) {
        apply_failure(&mut status, &e);
        persist_status(&api, &name, &status).await?;
        return Err(e);
    }

    // Step 5: load SPC, same-namespace required.
    let spc_namespace = ss.namespace().unwrap_or_else(|| "default".to_string());
    let spc_api: Api<SecretProviderClass> = Api::namespaced(ctx.client.clone(), &spc_namespace);
    let spc = match spc_api.get(&ss.spec.secret_provider_class_name).await {
        Ok(spc) => spc,
        Err(e) => {
            let err = ReconcileError::SecretProviderClassMisconfigured {
                name: ss.spec.secret_provider_class_name.clone(),
                source: e.into(),
            };
            apply_failure(&mut status, &err);
            persist_status(&api, &name, &status).await?;
            return Err(err);
        }
    };

    // Step 6: fetch.
    let data = match fetch::fetch(
        ss,
        &spc,
        &ctx.identity,
        &ctx.config.token_request_audiences,
        &ctx.token_cache,
        &ctx.plugin_pool,
    )
    .await
    {
        Ok(data) => data,
        Err(e) => {
            apply_failure(&mut status, &e);
            persist_status(&api, &name, &status).await?;
            return Err(e);
        }
    };

    // Step 7: fingerprint + compare.
    let envelope = FingerprintEnvelope {
        spc_uid: spc.uid().unwrap_or_default(),
        spc_generation: spc.meta().generation.unwrap_or(0),
        ss_uid: ss.uid().unwrap_or_default(),
        ss_generation: ss.meta().generation.unwrap_or(0),
        force_synchronization: ss.spec.force_synchronization,
    };
    let new_hash = fingerprint::compute(&data, &envelope);
    let hash_changed = new_hash != status.sync_hash;

    // Step 8: decide retry.
    let retry = conditions::any_condition_needs_retry(&status) || hash_changed;
    if !retry {
        debug!("steady state, no action taken");
        return Ok(Action::requeue(Duration::from_secs(
            ctx.config.reconciliation_error_requeue_secs,
        )));
    }

    // Step 9: preview success conditions in memory only.
    let mut preview_status = status.clone();
    conditions::preview_success(&mut preview_status, is_create, hash_changed);

    // Step 10: snapshot, then tentatively advance.
    let old_hash = status.sync_hash.clone();
    let old_last_success = status.last_successful_sync_time.clone();
    preview_status.sync_hash = new_hash;
    preview_status.last_successful_sync_time = Some(chrono::Utc::now().to_rfc3339());

    // Step 11: write.
    if let Err(e) = writer::apply_secret(ctx.client.clone(), ss, &data).await {
        // Roll back hash/timestamp and the previewed conditions atomically.
        let mut rolled_back = status.clone();
        rolled_back.sync_hash = old_hash;
        rolled_back.last_successful_sync_time = old_last_success;
        apply_failure(&mut rolled_back, &e);
        persist_status(&api, &name, &rolled_back).await?;
        return Err(e);
    }

    // Step 12: success, persist the previewed status.
    if is_create {
        metrics::record_secret_created();
    } else {
        metrics::record_secret_updated();
    }
    persist_status(&api, &name, &preview_status).await?;
    emit_event(
        &ctx.client,
        ss,
        EventType::Normal,
        if is_create { "CreateSuccessful" } else { "SecretUpToDate" },
        "secret synchronized successfully",
    )
    .await;

    Ok(Action::requeue(Duration::from_secs(
        ctx.config.reconciliation_error_requeue_secs,
    )))
}

fn apply_failure(status: &mut crate::crd::SecretSyncStatus, error: &ReconcileError) {
    let reason = error.reason();
    for condition_type in error.affected_conditions() {
        conditions::set(
            status,
            *condition_type,
            ConditionStatus::False,
            reason,
            error.to_string(),
        );
    }
}

async fn persist_status(
    api: &Api<SecretSync>,
    name: &str,
    status: &crate::crd::SecretSyncStatus,
) -> Result<(), ReconcileError> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(crate::constants::FIELD_MANAGER), &Patch::Merge(patch))
        .await
        .map_err(|e| ReconcileError::ControllerPatchError {
            name: name.to_string(),
            source: e.into(),
        })?;
    Ok(())
}

async fn emit_event(
    client: &Client,
    ss: &SecretSync,
    event_type: EventType,
    reason: &str,
    note: &str,
) {
    let recorder = Recorder::new(
        client.clone(),
        Reporter {
            controller: EVENT_COMPONENT.to_string(),
            instance: None,
        },
    );
    let object_ref = ss.object_ref(&());
    if let Err(e) = recorder
        .publish(
            &Event {
                type_: event_type,
                reason: reason.to_string(),
                note: Some(note.to_string()),
                action: "Reconcile".to_string(),
                secondary: None,
            },
            &object_ref,
        )
        .await
    {
        warn!(error = %e, "failed to publish event");
    }
}

/// Error policy invoked by `Controller::run` for every reconcile error.
/// Tracks per-resource exponential backoff outside the reconciler so a burst
/// of failing resources never blocks the watch/timer paths.
pub fn error_policy(
    ss: Arc<SecretSync>,
    error: &ReconcileError,
    ctx: Arc<ReconcilerContext>,
) -> Action {
    let name = ss.name_any();
    let namespace = ss.namespace().unwrap_or_else(|| "default".to_string());
    let resource_key = format!("{namespace}/{name}");

    error!(resource = %resource_key, %error, "reconcile failed");

    let backoff_seconds = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key).or_insert_with(|| BackoffState {
                backoff: ExponentialBackoff::new(
                    ctx.config.backoff_start_ms / 1000,
                    ctx.config.backoff_max_ms / 1000,
                ),
                error_count: 0,
            });
            state.increment_error();
            state.backoff.next_backoff_seconds().max(1)
        }
        Err(_) => {
            warn!("failed to lock backoff_states, using default backoff");
            ctx.config.reconciliation_error_requeue_secs
        }
    };

    Action::requeue(Duration::from_secs(backoff_seconds))
}
