//! CDR ingester service binary.
//!
//! Drains CDRs pushed to a Redis list on a fixed interval and writes them to Postgres
//! or to a rotating log file, depending on the configured sink mode.

use crate::config::load_ingester_config;
use crate::core::start_ingester_with_config;
use crate::error::{IngesterError, IngesterResult};

use cdr_config::shared::IngesterConfig;
use cdr_telemetry::metrics::init_metrics;
use cdr_telemetry::tracing::init_tracing;
use tracing::{error, info};

mod config;
mod core;
mod error;

/// Entry point for the ingester service.
///
/// Loads configuration, initializes tracing and metrics, then starts the async
/// runtime and runs the ingestion loop until a shutdown signal arrives.
fn main() {
    if let Err(err) = run() {
        eprint!("{}", err.render_report());
        std::process::exit(1);
    }
}

fn run() -> IngesterResult<()> {
    let ingester_config = load_ingester_config()?;

    let _log_flusher = init_tracing(
        env!("CARGO_BIN_NAME"),
        ingester_config.telemetry.log_dir.as_deref(),
    )
    .map_err(IngesterError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(ingester_config))?;

    Ok(())
}

/// Installs the metrics exporter inside the runtime and starts the ingester.
async fn async_main(ingester_config: IngesterConfig) -> IngesterResult<()> {
    match ingester_config.telemetry.metrics_port {
        Some(port) => {
            init_metrics(port).map_err(IngesterError::config)?;
            info!(port, "prometheus exporter listening");
        }
        None => info!("metrics port not configured, prometheus exporter disabled"),
    }

    if let Err(err) = start_ingester_with_config(ingester_config).await {
        error!("{err:#}");
        return Err(IngesterError::Runtime(err));
    }

    Ok(())
}
