use std::time::Duration;

use anyhow::Context;
use cdr::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use cdr::destination::CdrStore;
use cdr::destination::log_file::LogFileSink;
use cdr::destination::postgres::PostgresCdrStore;
use cdr::queue::redis::{RedisCdrQueue, RedisQueueConfig};
use cdr::workers::coordinator::{CoordinatorSettings, WorkCoordinator};
use cdr::workers::route::SinkRoute;
use cdr::writer::{DurableWriter, RetryPolicy};
use cdr_config::shared::{
    CDR_INGESTER_OPTIONS, DatabaseConfig, IngestConfig, IngesterConfig, IntoConnectOptions,
    LogsConfig, PgConnectionConfig, QueueConfig, SinkMode,
};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

/// Starts the ingester with the provided configuration.
///
/// Connects to Redis, builds the sink selected by the configured mode and runs the
/// coordinator until SIGINT or SIGTERM. Sinks are dispatched statically, one arm per
/// store type.
pub async fn start_ingester_with_config(ingester_config: IngesterConfig) -> anyhow::Result<()> {
    info!("starting cdr ingester");

    log_config(&ingester_config);

    let queue = connect_queue(&ingester_config.queue).await?;
    let settings = coordinator_settings(&ingester_config.queue, &ingester_config.ingest);

    match &ingester_config.ingest.mode {
        SinkMode::Database => {
            let database = ingester_config
                .database
                .as_ref()
                .context("database mode requires a `database` section")?;
            let store = PostgresCdrStore::connect_lazy(
                database.connection.with_db(Some(&CDR_INGESTER_OPTIONS)),
                database.max_connections,
            );
            let writer = DurableWriter::new(
                store.clone(),
                RetryPolicy::new(
                    database.max_retries,
                    Duration::from_millis(database.retry_delay_ms),
                ),
            );

            run_coordinator(settings, queue.clone(), SinkRoute::Database(writer)).await?;
            store.close().await;
        }
        SinkMode::Logs => {
            let logs = ingester_config
                .logs
                .as_ref()
                .context("logs mode requires a `logs` section")?;
            let sink = LogFileSink::new(logs.location.clone(), logs.separator.clone());

            run_coordinator(settings, queue.clone(), SinkRoute::<PostgresCdrStore>::Logs(sink))
                .await?;
        }
        SinkMode::Kafka => {
            warn!("kafka sink is not implemented, records will stay in the queue");
            run_coordinator(settings, queue.clone(), SinkRoute::<PostgresCdrStore>::Kafka).await?;
        }
        SinkMode::Unknown(mode) => {
            error!(mode = %mode, "unknown sink mode, records will stay in the queue");
            run_coordinator(
                settings,
                queue.clone(),
                SinkRoute::<PostgresCdrStore>::Unknown(mode.clone()),
            )
            .await?;
        }
    }

    if let Err(err) = queue.quit().await {
        warn!(error = %err, "failed to close redis connections");
    }

    info!("cdr ingester stopped");

    Ok(())
}

async fn connect_queue(config: &QueueConfig) -> anyhow::Result<RedisCdrQueue> {
    let nodes = config
        .parsed_nodes()
        .context("invalid redis node address")?;

    let queue = RedisCdrQueue::connect(RedisQueueConfig {
        nodes,
        username: config.username.clone(),
        password: config.password.clone(),
        pool_size: config.pool_size,
        command_timeout: Duration::from_millis(config.command_timeout_ms),
    })
    .await
    .context("failed to connect to redis")?;

    Ok(queue)
}

fn coordinator_settings(queue: &QueueConfig, ingest: &IngestConfig) -> CoordinatorSettings {
    CoordinatorSettings {
        key: queue.key.clone(),
        worker_count: ingest.workers,
        records_take: ingest.records_take,
        batch_size: ingest.batch_size,
        interval: Duration::from_millis(ingest.interval_ms),
    }
}

/// Runs a coordinator until a shutdown signal is received.
///
/// A tick in progress when the signal arrives is allowed to finish, so no popped
/// record is abandoned mid-batch.
#[tracing::instrument(skip_all, fields(sink = route.name()))]
async fn run_coordinator<S>(
    settings: CoordinatorSettings,
    queue: RedisCdrQueue,
    route: SinkRoute<S>,
) -> anyhow::Result<()>
where
    S: CdrStore + Send + Sync + 'static,
{
    let coordinator = WorkCoordinator::new(settings, queue, route)
        .context("invalid ingestion settings")?;

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let shutdown_handle = tokio::spawn(listen_for_shutdown(shutdown_tx));

    coordinator.run(shutdown_rx).await;

    // If the loop ended for another reason the listener is still waiting.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    Ok(())
}

/// Waits for SIGINT or SIGTERM and requests shutdown.
async fn listen_for_shutdown(shutdown_tx: ShutdownTx) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!(error = %err, "failed to register sigterm handler, only ctrl+c will stop the ingester");
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for ctrl+c");
                return;
            }
            info!("sigint (ctrl+c) received, shutting down ingester");
            shutdown_tx.shutdown();
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received, shutting down ingester");
        }
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down ingester");
        }
    }

    shutdown_tx.shutdown();
}

fn log_config(config: &IngesterConfig) {
    log_queue_config(&config.queue);
    log_ingest_config(&config.ingest);

    if let Some(database) = &config.database {
        log_database_config(database);
    }
    if let Some(logs) = &config.logs {
        log_logs_config(logs);
    }
}

fn log_queue_config(config: &QueueConfig) {
    debug!(
        nodes = ?config.nodes,
        key = config.key,
        pool_size = config.pool_size,
        command_timeout_ms = config.command_timeout_ms,
        auth = config.password.is_some(),
        "redis queue config"
    );
}

fn log_ingest_config(config: &IngestConfig) {
    debug!(
        workers = config.workers,
        records_take = config.records_take,
        batch_size = config.batch_size,
        interval_ms = config.interval_ms,
        mode = %config.mode,
        "ingest config"
    );
}

fn log_database_config(config: &DatabaseConfig) {
    debug!(
        max_connections = config.max_connections,
        max_retries = config.max_retries,
        retry_delay_ms = config.retry_delay_ms,
        "database sink config"
    );
    log_pg_connection_config(&config.connection);
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    debug!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "destination postgres connection config",
    );
}

fn log_logs_config(config: &LogsConfig) {
    debug!(
        location = %config.location.display(),
        separator = config.separator,
        "log file sink config"
    );
}
