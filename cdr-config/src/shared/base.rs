use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The worker count must be positive.
    #[error("`ingest.workers` must be greater than 0")]
    WorkersZero,
    /// Batches must hold at least one record.
    #[error("`ingest.batch_size` must be greater than 0")]
    BatchSizeZero,
    /// The tick interval must be positive.
    #[error("`ingest.interval_ms` must be greater than 0")]
    IntervalZero,
    /// The queue needs at least one node to connect to.
    #[error("`queue.nodes` must contain at least one `host:port` entry")]
    QueueNodesEmpty,
    /// A queue node is not a valid `host:port` pair.
    #[error("invalid queue node `{0}`: expected `host:port`")]
    InvalidQueueNode(String),
    /// The queue key is blank.
    #[error("`queue.key` cannot be empty")]
    QueueKeyEmpty,
    /// The selected sink mode needs a section that is absent.
    #[error("sink mode `{mode}` requires the `{section}` section")]
    MissingSinkSection {
        mode: &'static str,
        section: &'static str,
    },
    /// The log sink separator is empty.
    #[error("`logs.separator` cannot be empty")]
    SeparatorEmpty,
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The database pool needs at least one connection.
    #[error("`database.max_connections` must be greater than 0")]
    MaxConnectionsZero,
}
