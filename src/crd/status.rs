//! # SecretSync status
//!
//! Status types for tracking reconciliation state. `status.syncHash` and
//! `status.lastSuccessfulSyncTime` are the rollback-law fields (spec §8);
//! `status.conditions` carries the two typed conditions from the condition
//! manager (spec §4.7).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of the `SecretSync` resource. Written only by the controller,
/// only via the status subresource.
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretSyncStatus {
    /// Content-derived fingerprint of the last successfully applied data
    /// (spec §4.4). Empty until the first successful write.
    #[serde(default)]
    pub sync_hash: String,
    /// RFC3339 timestamp of the last successful apply.
    #[serde(default)]
    pub last_successful_sync_time: Option<String>,
    /// The two typed conditions, `SecretCreated` and `SecretUpdated`.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// The two condition types this controller reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    SecretCreated,
    SecretUpdated,
}

impl ConditionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::SecretCreated => "SecretCreated",
            ConditionType::SecretUpdated => "SecretUpdated",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state condition status, mirroring `metav1.ConditionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

/// A single status condition. `last_transition_time` only advances when
/// `status` or `reason` actually changes (spec §4.7).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: ConditionType,
    pub status: ConditionStatus,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl Condition {
    #[must_use]
    pub fn initial(condition_type: ConditionType) -> Self {
        let reason = match condition_type {
            ConditionType::SecretCreated => "SyncStarting",
            ConditionType::SecretUpdated => "NoUpdatesAttemptedYet",
        };
        Self {
            r#type: condition_type,
            status: ConditionStatus::Unknown,
            last_transition_time: None,
            reason: reason.to_string(),
            message: String::new(),
        }
    }
}
