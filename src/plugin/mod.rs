//! # Plugin client pool
//!
//! Discovers and dials local provider plugins over a Unix domain socket,
//! keeps connections, and performs RPCs with typed retry (§4.2).

pub mod client;
pub mod pool;
pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("v1alpha1");
}

pub use client::{MountOutcome, PluginClient};
pub use pool::PluginPool;
