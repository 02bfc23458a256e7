use serde::Deserialize;
use std::path::PathBuf;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Settings for the Postgres sink.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Connection to the database owning the `cdr` table.
    pub connection: PgConnectionConfig,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Total insert attempts per batch, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed pause between attempts in milliseconds.
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl DatabaseConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    pub const DEFAULT_MAX_RETRIES: u32 = 5;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_connections == 0 {
            return Err(ValidationError::MaxConnectionsZero);
        }

        self.connection.validate()
    }
}

/// Settings for the rotating log file sink.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogsConfig {
    /// Field separator used in each line.
    pub separator: String,
    /// Directory holding `cdr.log` and its rotated siblings.
    pub location: PathBuf,
}

impl LogsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.separator.is_empty() {
            return Err(ValidationError::SeparatorEmpty);
        }

        Ok(())
    }
}

fn default_max_connections() -> u32 {
    DatabaseConfig::DEFAULT_MAX_CONNECTIONS
}

fn default_max_retries() -> u32 {
    DatabaseConfig::DEFAULT_MAX_RETRIES
}
