//! # Identity
//!
//! Scoped credential acquisition: short-lived service-account tokens with
//! caching, refresh-ahead-of-expiry, and jitter.

pub mod token_cache;

pub use token_cache::{TokenCache, TokenCacheKey};
