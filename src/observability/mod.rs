//! # Observability
//!
//! Structured logging and Prometheus metrics for the controller.

pub mod logging;
pub mod metrics;
