use std::{io, path::Path, sync::Once};

use thiserror::Error;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, InitError},
};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use ::tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, registry};

/// Filter applied when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Number of daily log files kept in the log directory.
const MAX_LOG_FILES: usize = 14;

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to bridge `log` records into tracing: {0}")]
    LogTracer(#[from] SetLoggerError),

    #[error("failed to create the rolling log appender: {0}")]
    Appender(#[from] InitError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive for the lifetime of the process; dropping it early loses
/// the tail of the log when writing to files.
#[must_use = "dropping the flusher stops log delivery to files"]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber.
///
/// Without `log_dir` events are printed to stdout in a human readable form.
/// With `log_dir` they are written as JSON lines to `<log_dir>/<app_name>.<date>`,
/// rotated daily.
pub fn init_tracing(app_name: &str, log_dir: Option<&Path>) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    match log_dir {
        Some(log_dir) => {
            let appender = rolling::Builder::new()
                .rotation(rolling::Rotation::DAILY)
                .filename_prefix(app_name)
                .max_log_files(MAX_LOG_FILES)
                .build(log_dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            set_global_default(
                registry().with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_writer(writer)
                        .with_filter(filter()),
                ),
            )?;

            Ok(LogFlusher {
                _guard: Some(guard),
            })
        }
        None => {
            set_global_default(
                registry().with(fmt::layer().with_writer(io::stdout).with_filter(filter())),
            )?;

            Ok(LogFlusher { _guard: None })
        }
    }
}

static INIT_TEST_TRACING: Once = Once::new();

/// Installs a test writer subscriber once per test binary.
///
/// Output is only shown when `ENABLE_TRACING` is set, so tests stay quiet by default.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
