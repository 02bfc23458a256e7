use serde::Deserialize;
use std::path::PathBuf;

/// Logging and metrics settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    /// Directory for daily-rolling JSON logs. Logs go to stdout when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Port of the Prometheus endpoint. Metrics are not exported when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}
