//! # Custom Resource Definitions
//!
//! CRD types for the SecretSync controller.
//!
//! ## Module structure
//!
//! - `secret_sync.rs` - the `SecretSync` request object and its spec
//! - `secret_provider_class.rs` - the `SecretProviderClass` external-store descriptor
//! - `status.rs` - status/condition types shared by `SecretSync`

mod secret_provider_class;
mod secret_sync;
mod status;

pub use secret_provider_class::{SecretProviderClass, SecretProviderClassSpec};
pub use secret_sync::{SecretObjectData, SecretObjectSpec, SecretSync, SecretSyncSpec};
pub use status::{Condition, ConditionStatus, ConditionType, SecretSyncStatus};
