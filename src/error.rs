//! # Error taxonomy
//!
//! A classified error enum that every fallible reconcile stage returns.
//! Each variant carries its own condition reason (§7 of the design spec) so
//! the reconciler never string-matches to decide which reason to report.

use crate::crd::ConditionType;
use thiserror::Error;

/// Closed taxonomy of condition reasons. `Display` projects the exact wire
/// string that appears in `status.conditions[*].reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionReason {
    SyncStarting,
    NoUpdatesAttemptedYet,
    InvalidClusterSecretLabelError,
    InvalidClusterSecretAnnotationError,
    SecretProviderClassMisconfigured,
    ProviderError,
    RemoteSecretStoreFetchFailed,
    ControllerSyncError,
    ControllerPatchError,
    CreateSuccessful,
    SecretUpToDate,
}

impl ConditionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionReason::SyncStarting => "SyncStarting",
            ConditionReason::NoUpdatesAttemptedYet => "NoUpdatesAttemptedYet",
            ConditionReason::InvalidClusterSecretLabelError => "InvalidClusterSecretLabelError",
            ConditionReason::InvalidClusterSecretAnnotationError => {
                "InvalidClusterSecretAnnotationError"
            }
            ConditionReason::SecretProviderClassMisconfigured => {
                "SecretProviderClassMisconfigured"
            }
            ConditionReason::ProviderError => "ProviderError",
            ConditionReason::RemoteSecretStoreFetchFailed => "RemoteSecretStoreFetchFailed",
            ConditionReason::ControllerSyncError => "ControllerSyncError",
            ConditionReason::ControllerPatchError => "ControllerPatchError",
            ConditionReason::CreateSuccessful => "CreateSuccessful",
            ConditionReason::SecretUpToDate => "SecretUpToDate",
        }
    }

    /// Whether observing this reason should re-enter the retry set (§4.7).
    #[must_use]
    pub fn triggers_retry(self) -> bool {
        matches!(
            self,
            ConditionReason::SecretProviderClassMisconfigured
                | ConditionReason::InvalidClusterSecretLabelError
                | ConditionReason::InvalidClusterSecretAnnotationError
                | ConditionReason::ProviderError
                | ConditionReason::RemoteSecretStoreFetchFailed
                | ConditionReason::ControllerPatchError
                | ConditionReason::ControllerSyncError
        )
    }
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified reconcile error. Every variant maps to exactly one
/// [`ConditionReason`] and to which of the two condition types it affects.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("label {key} is reserved for use by the Secrets Store Sync Controller")]
    InvalidSecretLabel { key: String },

    #[error("annotation {key} is reserved for use by the Secrets Store Sync Controller")]
    InvalidSecretAnnotation { key: String },

    #[error("failed to get SecretProviderClass \"{name}\": {source}")]
    SecretProviderClassMisconfigured {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("provider RPC failed: {0}")]
    ProviderError(anyhow::Error),

    #[error("fetching secrets from the provider failed: {0}")]
    RemoteSecretStoreFetchFailed(String),

    #[error("internal controller error: {0}")]
    ControllerSyncError(anyhow::Error),

    #[error("failed to patch secret \"{name}\": {source}")]
    ControllerPatchError {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("kube API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcileError {
    /// The condition reason this error maps to.
    #[must_use]
    pub fn reason(&self) -> ConditionReason {
        match self {
            ReconcileError::InvalidSecretLabel { .. } => {
                ConditionReason::InvalidClusterSecretLabelError
            }
            ReconcileError::InvalidSecretAnnotation { .. } => {
                ConditionReason::InvalidClusterSecretAnnotationError
            }
            ReconcileError::SecretProviderClassMisconfigured { .. } => {
                ConditionReason::SecretProviderClassMisconfigured
            }
            ReconcileError::ProviderError(_) => ConditionReason::ProviderError,
            ReconcileError::RemoteSecretStoreFetchFailed(_) => {
                ConditionReason::RemoteSecretStoreFetchFailed
            }
            ReconcileError::ControllerSyncError(_) => ConditionReason::ControllerSyncError,
            ReconcileError::ControllerPatchError { .. } => ConditionReason::ControllerPatchError,
            ReconcileError::Kube(_) => ConditionReason::ControllerSyncError,
        }
    }

    /// Which condition type(s) this error affects. Validation-stage errors
    /// (labels/annotations) only ever affect `SecretCreated` per §4.8 step 4;
    /// everything past SPC resolution affects both.
    #[must_use]
    pub fn affected_conditions(&self) -> &'static [ConditionType] {
        match self {
            ReconcileError::InvalidSecretLabel { .. }
            | ReconcileError::InvalidSecretAnnotation { .. } => &[ConditionType::SecretCreated],
            _ => &[ConditionType::SecretCreated, ConditionType::SecretUpdated],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_match_wire_taxonomy() {
        assert_eq!(
            ConditionReason::SecretProviderClassMisconfigured.as_str(),
            "SecretProviderClassMisconfigured"
        );
        assert_eq!(ConditionReason::CreateSuccessful.as_str(), "CreateSuccessful");
    }

    #[test]
    fn retry_set_matches_spec() {
        assert!(ConditionReason::ProviderError.triggers_retry());
        assert!(ConditionReason::ControllerPatchError.triggers_retry());
        assert!(!ConditionReason::CreateSuccessful.triggers_retry());
        assert!(!ConditionReason::SecretUpToDate.triggers_retry());
    }

    #[test]
    fn patch_error_message_has_required_prefix() {
        let err = ReconcileError::ControllerPatchError {
            name: "s1".to_string(),
            source: anyhow::anyhow!("admission denied"),
        };
        assert!(err.to_string().starts_with("failed to patch secret \"s1\":"));
    }
}
