use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Connection settings for the Redis list holding pending CDRs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// `host:port` entries. One entry connects to a single node, several to a cluster.
    pub nodes: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Per-command timeout in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Name of the list the CDRs are pushed to.
    pub key: String,
}

impl QueueConfig {
    pub const DEFAULT_POOL_SIZE: usize = 4;

    pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::QueueNodesEmpty);
        }

        for node in &self.nodes {
            parse_node(node)?;
        }

        if self.key.trim().is_empty() {
            return Err(ValidationError::QueueKeyEmpty);
        }

        Ok(())
    }

    /// Returns the configured nodes split into host and port.
    pub fn parsed_nodes(&self) -> Result<Vec<(String, u16)>, ValidationError> {
        self.nodes.iter().map(|node| parse_node(node)).collect()
    }
}

fn parse_node(node: &str) -> Result<(String, u16), ValidationError> {
    let invalid = || ValidationError::InvalidQueueNode(node.to_string());

    let (host, port) = node.trim().rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok((host.to_string(), port))
}

fn default_pool_size() -> usize {
    QueueConfig::DEFAULT_POOL_SIZE
}

fn default_command_timeout_ms() -> u64 {
    QueueConfig::DEFAULT_COMMAND_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(nodes: &[&str]) -> QueueConfig {
        QueueConfig {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            username: None,
            password: None,
            pool_size: QueueConfig::DEFAULT_POOL_SIZE,
            command_timeout_ms: QueueConfig::DEFAULT_COMMAND_TIMEOUT_MS,
            key: "cdr".to_string(),
        }
    }

    #[test]
    fn parses_host_and_port() {
        let config = queue(&["127.0.0.1:6379", "redis-2:7000"]);

        assert_eq!(
            config.parsed_nodes().unwrap(),
            vec![
                ("127.0.0.1".to_string(), 6379),
                ("redis-2".to_string(), 7000)
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_malformed_nodes() {
        assert_eq!(
            queue(&[]).validate(),
            Err(ValidationError::QueueNodesEmpty)
        );
        assert_eq!(
            queue(&["localhost"]).validate(),
            Err(ValidationError::InvalidQueueNode("localhost".to_string()))
        );
        assert_eq!(
            queue(&[":6379"]).validate(),
            Err(ValidationError::InvalidQueueNode(":6379".to_string()))
        );
    }
}
