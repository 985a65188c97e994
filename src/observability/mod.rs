//! # Observability
//!
//! Prometheus metrics for the controller. Logging goes through `tracing` and is
//! initialised in `main`.

pub mod metrics;
