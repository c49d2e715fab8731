//! # Fingerprint engine
//!
//! Produces a stable, secret-preserving hash that changes iff a re-write is
//! warranted (§4.4). Deliberately expensive — it runs once per reconcile,
//! not per request — so a logged fingerprint cannot be brute-forced back to
//! its inputs by a short-lived operator session.

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use std::collections::BTreeMap;

const PBKDF2_ITERATIONS: u32 = 100_000;
const DERIVED_KEY_LEN: usize = 32;

/// Stable envelope identifying which SPC/SS generation and force-sync flag
/// produced the assembled data, joined with `|` ahead of the serialized data.
#[derive(Debug, Clone)]
pub struct FingerprintEnvelope {
    pub spc_uid: String,
    pub spc_generation: i64,
    pub ss_uid: String,
    pub ss_generation: i64,
    pub force_synchronization: bool,
}

impl FingerprintEnvelope {
    fn serialize(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.spc_uid,
            self.spc_generation,
            self.ss_uid,
            self.ss_generation,
            self.force_synchronization
        )
    }
}

/// Compute the sync hash over the assembled `targetKey → bytes` map plus the
/// stable envelope. The construction derives a 32-byte key via PBKDF2-SHA512
/// (salt = SS uid, password = serialized data + envelope), then HMAC-SHA512s
/// the derived key using itself as both MAC key and MAC input. Output is
/// lowercase hex.
///
/// This reuse of the derived key as both HMAC key and input is the
/// construction the design intentionally keeps (see `DESIGN.md`): any MAC
/// with equivalent security properties is an acceptable substitute, provided
/// the externally visible hash string is never compared cross-implementation.
#[must_use]
pub fn compute(data: &BTreeMap<String, Vec<u8>>, envelope: &FingerprintEnvelope) -> String {
    let mut password = Vec::new();
    for (key, value) in data {
        password.extend_from_slice(key.as_bytes());
        password.push(0);
        password.extend_from_slice(value);
        password.push(0);
    }
    password.extend_from_slice(envelope.serialize().as_bytes());

    let mut derived_key = [0u8; DERIVED_KEY_LEN];
    pbkdf2_hmac::<Sha512>(
        &password,
        envelope.ss_uid.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut derived_key,
    );

    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(&derived_key)
        .expect("HMAC accepts keys of any length");
    mac.update(&derived_key);
    let tag = mac.finalize().into_bytes();

    hex_lower(&tag)
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> FingerprintEnvelope {
        FingerprintEnvelope {
            spc_uid: "spc-uid".to_string(),
            spc_generation: 1,
            ss_uid: "ss-uid".to_string(),
            ss_generation: 1,
            force_synchronization: false,
        }
    }

    #[test]
    fn stable_for_identical_inputs() {
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());
        let a = compute(&data, &envelope());
        let b = compute(&data, &envelope());
        assert_eq!(a, b);
    }

    #[test]
    fn changes_when_data_changes() {
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());
        let before = compute(&data, &envelope());

        data.insert("bar".to_string(), b"new-secret".to_vec());
        let after = compute(&data, &envelope());

        assert_ne!(before, after);
    }

    #[test]
    fn changes_when_generation_changes() {
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());
        let before = compute(&data, &envelope());

        let mut changed = envelope();
        changed.ss_generation = 2;
        let after = compute(&data, &changed);

        assert_ne!(before, after);
    }

    #[test]
    fn changes_when_force_sync_flag_changes() {
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());
        let before = compute(&data, &envelope());

        let mut changed = envelope();
        changed.force_synchronization = true;
        let after = compute(&data, &changed);

        assert_ne!(before, after);
    }

    #[test]
    fn output_is_lowercase_hex() {
        let mut data = BTreeMap::new();
        data.insert("bar".to_string(), b"secret".to_vec());
        let hash = compute(&data, &envelope());
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash.len(), 128); // SHA-512 MAC output, hex-encoded
    }
}
