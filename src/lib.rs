//! # secret-sync-controller
//!
//! A cluster-scoped Kubernetes controller that materializes external
//! secret-store contents as native `Secret` objects, via a pluggable
//! provider RPC protocol. See `SecretSync` and `SecretProviderClass` in
//! [`crd`] for the two custom resources this controller watches.

pub mod backoff;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod crd;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod identity;
pub mod observability;
pub mod plugin;
pub mod reconciler;
pub mod server;
pub mod tls;
pub mod writer;

pub use crd::{SecretProviderClass, SecretProviderClassSpec, SecretSync, SecretSyncSpec};
pub use error::{ConditionReason, ReconcileError};
pub use reconciler::{reconcile, ReconcilerContext, TriggerSource};
