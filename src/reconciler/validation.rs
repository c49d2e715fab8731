//! # Reserved-key validation
//!
//! `spec.secretObject.labels`/`annotations` must not declare the controller's
//! reserved marker key (§4.8 step 4, §7).

use crate::constants::MANAGED_SECRET_MARKER_KEY;
use crate::crd::SecretSyncSpec;
use crate::error::ReconcileError;

pub fn validate_reserved_keys(spec: &SecretSyncSpec) -> Result<(), ReconcileError> {
    if spec.secret_object.labels.contains_key(MANAGED_SECRET_MARKER_KEY) {
        return Err(ReconcileError::InvalidSecretLabel {
            key: MANAGED_SECRET_MARKER_KEY.to_string(),
        });
    }
    if spec
        .secret_object
        .annotations
        .contains_key(MANAGED_SECRET_MARKER_KEY)
    {
        return Err(ReconcileError::InvalidSecretAnnotation {
            key: MANAGED_SECRET_MARKER_KEY.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{SecretObjectData, SecretObjectSpec};
    use std::collections::BTreeMap;

    fn spec_with_label(key: &str) -> SecretSyncSpec {
        let mut labels = BTreeMap::new();
        labels.insert(key.to_string(), "x".to_string());
        SecretSyncSpec {
            service_account_name: "sa".to_string(),
            secret_provider_class_name: "p".to_string(),
            secret_object: SecretObjectSpec {
                r#type: "Opaque".to_string(),
                labels,
                annotations: BTreeMap::new(),
                data: vec![SecretObjectData {
                    source_path: "foo".to_string(),
                    target_key: "bar".to_string(),
                }],
            },
            force_synchronization: false,
        }
    }

    #[test]
    fn rejects_reserved_label() {
        let spec = spec_with_label(MANAGED_SECRET_MARKER_KEY);
        let err = validate_reserved_keys(&spec).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidSecretLabel { .. }));
    }

    #[test]
    fn allows_other_labels() {
        let spec = spec_with_label("team");
        assert!(validate_reserved_keys(&spec).is_ok());
    }
}
