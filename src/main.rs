//! # secret-sync-controller binary
//!
//! Process bootstrap: rustls provider install, tracing init, metrics
//! registration, HTTP server, Kubernetes client, and the `Controller` watch
//! loop over `SecretSync` (with `SecretProviderClass` as a secondary watch
//! mapped back to the `SecretSync` objects that reference it).

use futures::StreamExt;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use secret_sync_controller::config::{CallerIdentity, ControllerConfig};
use secret_sync_controller::crd::{SecretProviderClass, SecretSync};
use secret_sync_controller::identity::TokenCache;
use secret_sync_controller::observability::{logging, metrics};
use secret_sync_controller::plugin::PluginPool;
use secret_sync_controller::reconciler::{error_policy, reconcile, ReconcilerContext};
use secret_sync_controller::server::{start_server, ServerState};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("failed to install rustls crypto provider"));

    let config = ControllerConfig::from_env();
    logging::init(&config.log_level, &config.log_format);

    info!(
        "starting secret-sync-controller, build {} ({})",
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME")
    );

    if config.enable_metrics {
        metrics::register_metrics()?;
    }

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });
    let http_bind_addr = config.http_bind_addr.clone();
    let server_state_for_http = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(&http_bind_addr, server_state_for_http).await {
            error!(error = %e, "HTTP server exited");
        }
    });

    let client = Client::try_default().await?;

    if config.leader_election_enabled {
        let holder = match acquire_leadership(&client, &config).await {
            Ok(holder) => holder,
            Err(e) => {
                error!(error = %e, "failed to acquire leader election lease");
                std::process::exit(1);
            }
        };
        info!("acquired leader election lease");
        spawn_lease_renewer(client.clone(), config.clone(), holder);
    }

    let identity = CallerIdentity::from(&config);
    let token_cache = TokenCache::new(client.clone());
    token_cache.spawn_sweeper();

    let plugin_pool = PluginPool::new(
        config.provider_socket_dirs.clone(),
        config.max_rpc_response_bytes,
    );
    plugin_pool.spawn_liveness_prober();

    let max_concurrency = config.max_concurrent_reconciliations;
    let requeue_secs = config.reconciliation_error_requeue_secs;

    let ctx = Arc::new(ReconcilerContext {
        client: client.clone(),
        config,
        identity,
        token_cache,
        plugin_pool,
        backoff_states: Mutex::new(HashMap::new()),
    });

    let secret_syncs: Api<SecretSync> = Api::all(client.clone());
    let secret_provider_classes: Api<SecretProviderClass> = Api::all(client.clone());

    // A side reflector store of SecretSync objects, used only to answer the
    // `watches()` mapper below: "which SecretSyncs reference this SPC?".
    let (ss_store, ss_writer) = reflector::store::<SecretSync>();
    let ss_reflector = reflector::reflector(
        ss_writer,
        watcher(secret_syncs.clone(), watcher::Config::default()),
    );
    tokio::spawn(async move {
        ss_reflector
            .for_each(|event| async move {
                if let Err(e) = event {
                    warn!(error = %e, "SecretSync reflector watch error");
                }
            })
            .await;
    });

    server_state
        .is_ready
        .store(true, std::sync::atomic::Ordering::Relaxed);

    Controller::new(secret_syncs, watcher::Config::default())
        .watches(
            secret_provider_classes,
            watcher::Config::default(),
            move |spc| secret_syncs_referencing(&ss_store, &spc),
        )
        .shutdown_on_signal()
        .concurrency(max_concurrency)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => info!(?action, "reconciled"),
                Err(e) => warn!(error = %e, "reconcile stream error, requeued after {requeue_secs}s"),
            }
        })
        .await;

    info!("shutting down");
    Ok(())
}

/// Map an observed `SecretProviderClass` change to the `SecretSync` objects
/// that reference it (same namespace, matching `secretProviderClassName`).
fn secret_syncs_referencing(
    store: &Store<SecretSync>,
    spc: &SecretProviderClass,
) -> impl Iterator<Item = ObjectRef<SecretSync>> {
    let spc_namespace = spc.namespace();
    let spc_name = spc.name_any();
    store
        .state()
        .into_iter()
        .filter(move |ss| {
            ss.namespace() == spc_namespace && ss.spec.secret_provider_class_name == spc_name
        })
        .map(|ss| ObjectRef::from_obj(&ss))
        .collect::<Vec<_>>()
        .into_iter()
}

const LEASE_FIELD_MANAGER: &str = "secret-sync-controller-leader";

fn lease_holder_identity(config: &ControllerConfig) -> String {
    if config.pod_name.is_empty() {
        format!("secret-sync-controller-{}", std::process::id())
    } else {
        config.pod_name.clone()
    }
}

fn renewed_lease(config: &ControllerConfig, holder: &str) -> k8s_openapi::api::coordination::v1::Lease {
    use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
    use secret_sync_controller::constants::LEASE_DURATION_SECS;

    Lease {
        metadata: kube::api::ObjectMeta {
            name: Some(config.leader_election_lease_name.clone()),
            ..Default::default()
        },
        spec: Some(LeaseSpec {
            holder_identity: Some(holder.to_string()),
            lease_duration_seconds: Some(LEASE_DURATION_SECS.try_into().unwrap_or(15)),
            renew_time: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime(
                chrono::Utc::now(),
            )),
            ..Default::default()
        }),
    }
}

/// Acquire the leader-election lease, retrying indefinitely. Returns the
/// holder identity this process claimed it under, for
/// [`spawn_lease_renewer`] to keep renewing.
async fn acquire_leadership(client: &Client, config: &ControllerConfig) -> anyhow::Result<String> {
    use k8s_openapi::api::coordination::v1::Lease;
    use kube::api::{Patch, PatchParams};

    let leases: Api<Lease> = Api::namespaced(client.clone(), &config.leader_election_namespace);
    let holder = lease_holder_identity(config);

    loop {
        let lease = renewed_lease(config, &holder);

        match leases
            .patch(
                &config.leader_election_lease_name,
                &PatchParams::apply(LEASE_FIELD_MANAGER).force(),
                &Patch::Apply(&lease),
            )
            .await
        {
            Ok(_) => return Ok(holder),
            Err(e) => {
                warn!(error = %e, "lease acquisition attempt failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }
    }
}

/// Background renewal loop: re-applies the lease before `LEASE_RENEW_SECS`
/// elapses and exits the process (code 1) the moment renewal fails or
/// another holder has taken the lease out from under us (spec: "process
/// exits on lost lease").
fn spawn_lease_renewer(client: Client, config: ControllerConfig, holder: String) {
    use k8s_openapi::api::coordination::v1::Lease;
    use kube::api::{Patch, PatchParams};
    use secret_sync_controller::constants::LEASE_RENEW_SECS;

    tokio::spawn(async move {
        let leases: Api<Lease> = Api::namespaced(client, &config.leader_election_namespace);
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(LEASE_RENEW_SECS));
        interval.tick().await; // first tick fires immediately; we just acquired the lease

        loop {
            interval.tick().await;

            match leases.get(&config.leader_election_lease_name).await {
                Ok(current) => {
                    let current_holder = current
                        .spec
                        .as_ref()
                        .and_then(|s| s.holder_identity.clone());
                    if current_holder.as_deref() != Some(holder.as_str()) {
                        error!(
                            expected_holder = %holder,
                            actual_holder = ?current_holder,
                            "lost leader election lease, exiting"
                        );
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to read leader election lease during renewal, exiting");
                    std::process::exit(1);
                }
            }

            let lease = renewed_lease(&config, &holder);
            if let Err(e) = leases
                .patch(
                    &config.leader_election_lease_name,
                    &PatchParams::apply(LEASE_FIELD_MANAGER).force(),
                    &Patch::Apply(&lease),
                )
                .await
            {
                error!(error = %e, "failed to renew leader election lease, exiting");
                std::process::exit(1);
            }
        }
    });
}
