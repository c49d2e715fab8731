//! # CRD generator
//!
//! Emits the OpenAPI v3 CRD YAML for `SecretSync` and `SecretProviderClass`.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/bases/secret-sync.x-k8s.io.yaml
//! ```

use kube::core::CustomResourceExt;
use secret_sync_controller::crd::{SecretProviderClass, SecretSync};

fn main() {
    let crds = vec![SecretSync::crd(), SecretProviderClass::crd()];

    for crd in crds {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => println!("---\n{yaml}"),
            Err(e) => {
                eprintln!("failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
