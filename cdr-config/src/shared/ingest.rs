use serde::Deserialize;
use std::fmt;

use crate::shared::ValidationError;

/// Where fetched batches are written.
///
/// Parsed case-insensitively. Values that name no known sink are kept as
/// [`SinkMode::Unknown`] so that loading succeeds and the ingester can report
/// the problem on every tick instead of refusing to start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SinkMode {
    /// Insert into the `cdr` Postgres table.
    Database,
    /// Append to the rotating `cdr.log` file.
    Logs,
    /// Accepted but not implemented, batches are left in the queue.
    Kafka,
    Unknown(String),
}

impl SinkMode {
    pub fn as_str(&self) -> &str {
        match self {
            SinkMode::Database => "database",
            SinkMode::Logs => "logs",
            SinkMode::Kafka => "kafka",
            SinkMode::Unknown(value) => value,
        }
    }
}

impl From<String> for SinkMode {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "database" => SinkMode::Database,
            "logs" => SinkMode::Logs,
            "kafka" => SinkMode::Kafka,
            _ => SinkMode::Unknown(value),
        }
    }
}

impl fmt::Display for SinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling and partitioning settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestConfig {
    /// Number of concurrent workers per tick.
    pub workers: u16,
    /// Maximum number of records drained per tick. `0` makes every tick a no-op.
    pub records_take: u64,
    /// Maximum number of records per batch.
    pub batch_size: u64,
    /// Period between ticks in milliseconds.
    pub interval_ms: u64,
    pub mode: SinkMode,
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::WorkersZero);
        }
        if self.batch_size == 0 {
            return Err(ValidationError::BatchSizeZero);
        }
        if self.interval_ms == 0 {
            return Err(ValidationError::IntervalZero);
        }

        Ok(())
    }
}
