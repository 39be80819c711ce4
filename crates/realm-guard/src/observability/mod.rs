//! Observability for the guard (metrics).
//!
//! Logging uses `tracing` directly in each module with `guard.*` targets.

pub mod metrics;
