//! Logging and metrics setup shared by the ingester binary and tests.

pub mod metrics;
pub mod tracing;
