use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::counter;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::destination::CdrStore;
use crate::error::{CdrResult, ErrorKind};
use crate::fetcher::BatchFetcher;
use crate::metrics::{CDR_TICKS_SKIPPED_TOTAL, CDR_TICKS_TOTAL, register_metrics};
use crate::queue::CdrQueue;
use crate::workers::pool::{WorkerPool, WorkerReport};
use crate::workers::route::{Delivery, SinkRoute};
use crate::writer::WriteOutcome;

/// How one tick splits the backlog between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPlan {
    /// Records considered this tick, `min(queue length, ceiling)`.
    pub backlog_size: u64,
    pub worker_count: u16,
    /// Records assigned to each worker. The division remainder stays queued.
    pub per_worker_share: u64,
}

impl WorkPlan {
    /// Returns the plan for a tick, or `None` when there is less than one record
    /// per worker.
    pub fn compute(queue_length: u64, ceiling: u64, worker_count: u16) -> Option<Self> {
        if worker_count == 0 {
            return None;
        }

        let backlog_size = queue_length.min(ceiling);
        if backlog_size == 0 || backlog_size < u64::from(worker_count) {
            return None;
        }

        Some(Self {
            backlog_size,
            worker_count,
            per_worker_share: backlog_size / u64::from(worker_count),
        })
    }
}

/// Static settings of a [`WorkCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Queue key the records are popped from.
    pub key: String,
    pub worker_count: u16,
    /// Maximum records considered per tick.
    pub records_take: u64,
    pub batch_size: u64,
    pub interval: Duration,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Workers were dispatched according to the plan.
    Dispatched {
        plan: WorkPlan,
        failed_workers: usize,
    },
    /// Not enough records for every worker to get one.
    Skipped { backlog_size: u64 },
    /// The sink mode does not write anywhere, the queue was not read.
    SinkInactive,
}

/// Periodic driver draining the queue into the configured sink.
///
/// Ticks never overlap: a tick starts only after every worker of the previous one
/// has finished, and periods missed meanwhile are delayed rather than replayed.
#[derive(Debug)]
pub struct WorkCoordinator<Q, S> {
    settings: CoordinatorSettings,
    key: Arc<str>,
    queue: Q,
    fetcher: Arc<BatchFetcher<Q>>,
    route: Arc<SinkRoute<S>>,
}

impl<Q, S> WorkCoordinator<Q, S>
where
    Q: CdrQueue + Clone + Send + Sync + 'static,
    S: CdrStore + Send + Sync + 'static,
{
    /// Creates a coordinator, rejecting settings that would prevent any tick from
    /// doing work.
    pub fn new(settings: CoordinatorSettings, queue: Q, route: SinkRoute<S>) -> CdrResult<Self> {
        if settings.worker_count == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Invalid worker count",
                "the number of workers must be greater than 0"
            );
        }
        if settings.interval.is_zero() {
            bail!(
                ErrorKind::ConfigError,
                "Invalid tick interval",
                "the tick interval must be greater than 0"
            );
        }

        register_metrics();

        Ok(Self {
            key: Arc::from(settings.key.as_str()),
            fetcher: Arc::new(BatchFetcher::new(queue.clone())),
            route: Arc::new(route),
            queue,
            settings,
        })
    }

    /// Runs ticks every interval until `shutdown` fires.
    ///
    /// A tick in progress when shutdown is requested runs to completion.
    pub async fn run(&self, mut shutdown: ShutdownRx) {
        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            key = %self.key,
            workers = self.settings.worker_count,
            records_take = self.settings.records_take,
            batch_size = self.settings.batch_size,
            interval_ms = period.as_millis() as u64,
            sink = self.route.name(),
            "starting cdr ingestion"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    info!("shutdown requested, stopping cdr ingestion");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(error = %err, "tick failed");
                    }
                }
            }
        }
    }

    /// Runs a single tick.
    ///
    /// Only a failure to read the queue length is returned. Worker failures are
    /// logged and reported through [`TickOutcome::Dispatched`].
    pub async fn tick(&self) -> CdrResult<TickOutcome> {
        match self.route.as_ref() {
            SinkRoute::Kafka => {
                debug!("kafka sink is not implemented, leaving queue untouched");
                return Ok(TickOutcome::SinkInactive);
            }
            SinkRoute::Unknown(mode) => {
                error!(mode = %mode, "unknown sink mode, leaving queue untouched");
                return Ok(TickOutcome::SinkInactive);
            }
            SinkRoute::Database(_) | SinkRoute::Logs(_) => {}
        }

        let queue_length = self.queue.length(&self.key).await?;
        let Some(plan) = WorkPlan::compute(
            queue_length,
            self.settings.records_take,
            self.settings.worker_count,
        ) else {
            let backlog_size = queue_length.min(self.settings.records_take);
            debug!(
                backlog_size,
                workers = self.settings.worker_count,
                "not enough records for every worker, skipping tick"
            );
            counter!(CDR_TICKS_SKIPPED_TOTAL).increment(1);
            return Ok(TickOutcome::Skipped { backlog_size });
        };

        counter!(CDR_TICKS_TOTAL).increment(1);
        debug!(
            backlog_size = plan.backlog_size,
            share = plan.per_worker_share,
            workers = plan.worker_count,
            "dispatching workers"
        );

        let mut pool = WorkerPool::new();
        for worker_id in 0..usize::from(plan.worker_count) {
            let span = info_span!("cdr_worker", worker_id, share = plan.per_worker_share);
            let worker = run_worker(
                self.fetcher.clone(),
                self.route.clone(),
                self.key.clone(),
                self.settings.batch_size,
                plan.per_worker_share,
            );
            pool.spawn(worker_id, worker.instrument(span));
        }

        let failed_workers = match pool.wait_all().await {
            Ok(_) => 0,
            Err(err) => {
                let failed = err.kinds().len();
                warn!(failed_workers = failed, "tick completed with failed workers");
                failed
            }
        };

        Ok(TickOutcome::Dispatched {
            plan,
            failed_workers,
        })
    }
}

/// Drains `share` records in batches and hands each non-empty batch to the sink.
async fn run_worker<Q, S>(
    fetcher: Arc<BatchFetcher<Q>>,
    route: Arc<SinkRoute<S>>,
    key: Arc<str>,
    batch_size: u64,
    share: u64,
) -> CdrResult<WorkerReport>
where
    Q: CdrQueue + Sync,
    S: CdrStore + Sync,
{
    let mut report = WorkerReport::default();
    let mut batches = pin!(fetcher.fetch(&key, batch_size, share));

    while let Some(batch) = batches.next().await {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }

        let delivery = route.deliver(&batch).await?;
        report.batches += 1;
        report.records += batch.len() as u64;
        if matches!(delivery, Delivery::Database(WriteOutcome::Dropped { .. })) {
            report.dropped_batches += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_when_backlog_is_smaller_than_worker_count() {
        assert_eq!(WorkPlan::compute(3, 100, 4), None);
        assert_eq!(WorkPlan::compute(0, 100, 1), None);
        assert_eq!(WorkPlan::compute(10, 0, 1), None);
        assert_eq!(WorkPlan::compute(10, 10, 0), None);
    }

    #[test]
    fn splits_evenly_and_leaves_remainder() {
        assert_eq!(
            WorkPlan::compute(10, 100, 3),
            Some(WorkPlan {
                backlog_size: 10,
                worker_count: 3,
                per_worker_share: 3,
            })
        );
    }

    #[test]
    fn caps_backlog_at_ceiling() {
        let plan = WorkPlan::compute(1_000, 100, 4).unwrap();

        assert_eq!(plan.backlog_size, 100);
        assert_eq!(plan.per_worker_share, 25);
    }

    #[test]
    fn exact_worker_count_gets_one_record_each() {
        let plan = WorkPlan::compute(4, 100, 4).unwrap();

        assert_eq!(plan.per_worker_share, 1);
    }
}
