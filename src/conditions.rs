//! # Condition manager
//!
//! Maintains the two typed conditions (`SecretCreated`, `SecretUpdated`) and
//! the "preview then roll back" sequence used by the reconciler: success
//! conditions are previewed in memory before the write; on write failure the
//! preview is discarded and the failure reason overwrites it atomically in
//! the same status patch, rather than relying on the failed write to
//! implicitly leave old conditions in place (§4.7, §9 Open Question).

use crate::crd::{Condition, ConditionStatus, ConditionType, SecretSyncStatus};
use crate::error::ConditionReason;
use chrono::Utc;

/// Ensure both condition types are present, initializing any missing ones.
/// Returns `true` if the status was mutated.
pub fn ensure_initialized(status: &mut SecretSyncStatus) -> bool {
    let mut changed = false;
    for condition_type in [ConditionType::SecretCreated, ConditionType::SecretUpdated] {
        if !status.conditions.iter().any(|c| c.r#type == condition_type) {
            status.conditions.push(Condition::initial(condition_type));
            changed = true;
        }
    }
    changed
}

/// Set `condition_type` to `status`/`reason`/`message`, advancing
/// `lastTransitionTime` only if status or reason actually changed.
pub fn set(
    status: &mut SecretSyncStatus,
    condition_type: ConditionType,
    condition_status: ConditionStatus,
    reason: ConditionReason,
    message: impl Into<String>,
) {
    let message = message.into();
    if let Some(existing) = status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type)
    {
        let transitioned = existing.status != condition_status || existing.reason != reason.as_str();
        existing.status = condition_status;
        existing.reason = reason.to_string();
        existing.message = message;
        if transitioned {
            existing.last_transition_time = Some(Utc::now().to_rfc3339());
        }
    } else {
        status.conditions.push(Condition {
            r#type: condition_type,
            status: condition_status,
            last_transition_time: Some(Utc::now().to_rfc3339()),
            reason: reason.to_string(),
            message,
        });
    }
}

/// Whether any condition currently carries a reason in the retry set, per
/// §4.7 ("the intent is a set" — duplicates in the source table collapse).
#[must_use]
pub fn any_condition_needs_retry(status: &SecretSyncStatus) -> bool {
    status.conditions.iter().any(|c| {
        reason_from_str(&c.reason)
            .map(ConditionReason::triggers_retry)
            .unwrap_or(false)
    })
}

fn reason_from_str(s: &str) -> Option<ConditionReason> {
    Some(match s {
        "SyncStarting" => ConditionReason::SyncStarting,
        "NoUpdatesAttemptedYet" => ConditionReason::NoUpdatesAttemptedYet,
        "InvalidClusterSecretLabelError" => ConditionReason::InvalidClusterSecretLabelError,
        "InvalidClusterSecretAnnotationError" => {
            ConditionReason::InvalidClusterSecretAnnotationError
        }
        "SecretProviderClassMisconfigured" => ConditionReason::SecretProviderClassMisconfigured,
        "ProviderError" => ConditionReason::ProviderError,
        "RemoteSecretStoreFetchFailed" => ConditionReason::RemoteSecretStoreFetchFailed,
        "ControllerSyncError" => ConditionReason::ControllerSyncError,
        "ControllerPatchError" => ConditionReason::ControllerPatchError,
        "CreateSuccessful" => ConditionReason::CreateSuccessful,
        "SecretUpToDate" => ConditionReason::SecretUpToDate,
        _ => return None,
    })
}

/// Preview the success conditions for `phase` without persisting, so a
/// subsequent write failure can discard the preview and set a failure
/// reason instead, in one status patch.
pub fn preview_success(status: &mut SecretSyncStatus, is_create: bool, hash_changed: bool) {
    if is_create {
        set(
            status,
            ConditionType::SecretCreated,
            ConditionStatus::True,
            ConditionReason::CreateSuccessful,
            String::new(),
        );
        set(
            status,
            ConditionType::SecretUpdated,
            ConditionStatus::True,
            ConditionReason::SecretUpToDate,
            String::new(),
        );
    } else if hash_changed {
        set(
            status,
            ConditionType::SecretUpdated,
            ConditionStatus::True,
            ConditionReason::SecretUpToDate,
            String::new(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_both_conditions_once() {
        let mut status = SecretSyncStatus::default();
        assert!(ensure_initialized(&mut status));
        assert_eq!(status.conditions.len(), 2);
        assert!(!ensure_initialized(&mut status));
    }

    #[test]
    fn transition_time_only_advances_on_change() {
        let mut status = SecretSyncStatus::default();
        ensure_initialized(&mut status);
        set(
            &mut status,
            ConditionType::SecretCreated,
            ConditionStatus::False,
            ConditionReason::ProviderError,
            "boom",
        );
        let first_transition = status
            .conditions
            .iter()
            .find(|c| c.r#type == ConditionType::SecretCreated)
            .unwrap()
            .last_transition_time
            .clone();

        set(
            &mut status,
            ConditionType::SecretCreated,
            ConditionStatus::False,
            ConditionReason::ProviderError,
            "boom again",
        );
        let second_transition = status
            .conditions
            .iter()
            .find(|c| c.r#type == ConditionType::SecretCreated)
            .unwrap()
            .last_transition_time
            .clone();

        assert_eq!(first_transition, second_transition);
    }

    #[test]
    fn retry_set_detection() {
        let mut status = SecretSyncStatus::default();
        ensure_initialized(&mut status);
        assert!(!any_condition_needs_retry(&status));

        set(
            &mut status,
            ConditionType::SecretCreated,
            ConditionStatus::False,
            ConditionReason::ControllerPatchError,
            "denied",
        );
        assert!(any_condition_needs_retry(&status));
    }
}
