//! Observability module for the organization service.
//!
//! Provides Prometheus metric definitions. Logging goes through `tracing`
//! with `org.*` targets.

pub mod metrics;
