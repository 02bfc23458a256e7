//! Shared configuration types for the CDR ingester.

mod base;
mod connection;
mod ingest;
mod ingester;
mod queue;
mod sinks;
mod telemetry;

pub use base::ValidationError;
pub use connection::{
    CDR_INGESTER_OPTIONS, IntoConnectOptions, PgConnectionConfig, PgConnectionOptions, TlsConfig,
};
pub use ingest::{IngestConfig, SinkMode};
pub use ingester::IngesterConfig;
pub use queue::QueueConfig;
pub use sinks::{DatabaseConfig, LogsConfig};
pub use telemetry::TelemetryConfig;
