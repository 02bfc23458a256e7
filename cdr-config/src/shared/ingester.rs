use serde::Deserialize;

use crate::Config;
use crate::shared::{
    DatabaseConfig, IngestConfig, LogsConfig, QueueConfig, SinkMode, TelemetryConfig,
    ValidationError,
};

/// Complete configuration of the ingester service.
///
/// This intentionally does not implement `Serialize` to avoid accidentally
/// leaking the queue or database passwords.
#[derive(Debug, Clone, Deserialize)]
pub struct IngesterConfig {
    pub queue: QueueConfig,
    pub ingest: IngestConfig,
    /// Required when `ingest.mode` is `database`.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Required when `ingest.mode` is `logs`.
    #[serde(default)]
    pub logs: Option<LogsConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl IngesterConfig {
    /// Validates the complete configuration.
    ///
    /// Every check here is fatal at startup. An unknown sink mode is not, it is
    /// reported by the coordinator on each tick.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.queue.validate()?;
        self.ingest.validate()?;

        match self.ingest.mode {
            SinkMode::Database => match &self.database {
                Some(database) => database.validate()?,
                None => {
                    return Err(ValidationError::MissingSinkSection {
                        mode: "database",
                        section: "database",
                    });
                }
            },
            SinkMode::Logs => match &self.logs {
                Some(logs) => logs.validate()?,
                None => {
                    return Err(ValidationError::MissingSinkSection {
                        mode: "logs",
                        section: "logs",
                    });
                }
            },
            SinkMode::Kafka | SinkMode::Unknown(_) => {}
        }

        Ok(())
    }
}

impl Config for IngesterConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["queue.nodes"];
}
