use std::time::Duration;

use fred::prelude::{
    ClientLike, EventInterface, ListInterface, Pool, ReconnectPolicy, Server, ServerConfig,
};
use fred::types::Builder;
use fred::types::config::UnresponsiveConfig;
use futures::future::join_all;
use secrecy::{ExposeSecret, Secret};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};

use crate::error::{CdrResult, ErrorKind};
use crate::queue::CdrQueue;
use crate::bail;

/// Connection settings for [`RedisCdrQueue`].
#[derive(Debug, Clone)]
pub struct RedisQueueConfig {
    /// `(host, port)` pairs. A single node connects directly, several form a cluster.
    pub nodes: Vec<(String, u16)>,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    pub pool_size: usize,
    pub command_timeout: Duration,
}

/// [`CdrQueue`] backed by a Redis list.
#[derive(Clone)]
pub struct RedisCdrQueue {
    pool: Pool,
}

impl RedisCdrQueue {
    /// Connects a pool to the configured nodes and waits until it is ready.
    pub async fn connect(config: RedisQueueConfig) -> CdrResult<Self> {
        let server = server_config(&config.nodes)?;
        let command_timeout = config.command_timeout;

        let pool = Builder::default_centralized()
            .with_config(|redis_config| {
                redis_config.username = config.username.clone();
                redis_config.password = config
                    .password
                    .as_ref()
                    .map(|password| password.expose_secret().clone());
                redis_config.server = server.clone();
            })
            .with_connection_config(|connection_config| {
                connection_config.internal_command_timeout = command_timeout;
                connection_config.reconnect_on_auth_error = true;
                connection_config.unresponsive = UnresponsiveConfig {
                    max_timeout: Some(command_timeout * 2),
                    interval: Duration::from_secs(3),
                };
            })
            .with_performance_config(|performance_config| {
                performance_config.default_command_timeout = command_timeout;
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 1, 2000, 5))
            .build_pool(config.pool_size.max(1))?;

        for client in pool.clients() {
            let mut error_rx = client.error_rx();
            let mut reconnect_rx = client.reconnect_rx();
            let mut unresponsive_rx = client.unresponsive_rx();

            tokio::spawn(async move {
                loop {
                    match error_rx.recv().await {
                        Ok((error, Some(server))) => {
                            error!(?server, %error, "redis client error");
                        }
                        Ok((error, None)) => {
                            error!(%error, "redis client error");
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            tokio::spawn(async move {
                loop {
                    match unresponsive_rx.recv().await {
                        Ok(server) => error!(?server, "redis client unresponsive"),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            tokio::spawn(async move {
                loop {
                    match reconnect_rx.recv().await {
                        Ok(server) => debug!(?server, "redis client connected"),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let connection_tasks = pool.connect_pool();
        pool.wait_for_connect().await?;
        info!(nodes = config.nodes.len(), "connected to redis");

        tokio::spawn(async move {
            let _results = join_all(connection_tasks).await;
        });

        Ok(Self { pool })
    }

    /// Closes every pooled connection.
    pub async fn quit(&self) -> CdrResult<()> {
        self.pool.quit().await?;
        Ok(())
    }
}

impl CdrQueue for RedisCdrQueue {
    async fn length(&self, key: &str) -> CdrResult<u64> {
        Ok(self.pool.llen::<u64, _>(key).await?)
    }

    async fn pop_front(&self, key: &str, count: usize) -> CdrResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        // `LPOP key count` replies nil when the list does not exist.
        let entries: Option<Vec<String>> = self.pool.lpop(key, Some(count)).await?;
        Ok(entries.unwrap_or_default())
    }
}

fn server_config(nodes: &[(String, u16)]) -> CdrResult<ServerConfig> {
    match nodes {
        [] => bail!(
            ErrorKind::ConfigError,
            "No redis node configured",
            "at least one `host:port` entry is required"
        ),
        [(host, port)] => Ok(ServerConfig::Centralized {
            server: Server::new(host.as_str(), *port),
        }),
        nodes => {
            let hosts = nodes
                .iter()
                .map(|(host, port)| (host.as_str(), *port))
                .collect::<Vec<_>>();
            Ok(ServerConfig::new_clustered(hosts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node_is_centralized() {
        let config = server_config(&[("localhost".to_string(), 6379)]).unwrap();

        assert!(matches!(config, ServerConfig::Centralized { .. }));
    }

    #[test]
    fn several_nodes_form_a_cluster() {
        let config = server_config(&[
            ("redis-1".to_string(), 7000),
            ("redis-2".to_string(), 7001),
        ])
        .unwrap();

        assert!(matches!(config, ServerConfig::Clustered { .. }));
    }

    #[test]
    fn no_node_is_a_config_error() {
        let err = server_config(&[]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
