use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::cdr_error;
use crate::error::{CdrError, CdrResult, ErrorKind};

/// Per-worker totals reported at the end of a share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Non-empty batches handed to the sink.
    pub batches: u64,
    /// Records contained in those batches.
    pub records: u64,
    /// Batches the database writer gave up on.
    pub dropped_batches: u64,
}

/// Owns the worker tasks of one tick.
#[derive(Debug, Default)]
pub struct WorkerPool {
    join_set: JoinSet<(usize, CdrResult<WorkerReport>)>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, worker_id: usize, future: F)
    where
        F: Future<Output = CdrResult<WorkerReport>> + Send + 'static,
    {
        self.join_set.spawn(async move {
            let result = future.await;
            (worker_id, result)
        });

        debug!(worker_id, "spawned worker in pool");
    }

    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }

    /// Waits for every worker to finish.
    ///
    /// A failing or panicking worker does not stop its siblings. Failures are logged
    /// as they are observed and returned together once all workers are done.
    pub async fn wait_all(&mut self) -> CdrResult<Vec<WorkerReport>> {
        let mut reports = Vec::with_capacity(self.join_set.len());
        let mut errors: Vec<CdrError> = Vec::new();

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok((worker_id, Ok(report))) => {
                    debug!(
                        worker_id,
                        batches = report.batches,
                        records = report.records,
                        "worker completed"
                    );
                    reports.push(report);
                }
                Ok((worker_id, Err(err))) => {
                    error!(worker_id, error = %err, "worker completed with error");
                    errors.push(err);
                }
                Err(join_err) if join_err.is_cancelled() => {
                    debug!("worker task was cancelled");
                }
                Err(join_err) => {
                    error!(error = %join_err, "worker panicked");
                    errors.push(cdr_error!(
                        ErrorKind::WorkerPanic,
                        "Worker panicked",
                        join_err
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(reports)
        } else {
            Err(errors.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bail;

    #[tokio::test]
    async fn collects_reports_from_every_worker() {
        let mut pool = WorkerPool::new();
        for worker_id in 0..3 {
            pool.spawn(worker_id, async move {
                Ok(WorkerReport {
                    batches: 1,
                    records: worker_id as u64,
                    dropped_batches: 0,
                })
            });
        }

        let reports = pool.wait_all().await.unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports.iter().map(|r| r.records).sum::<u64>(), 3);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn failures_do_not_stop_siblings() {
        let mut pool = WorkerPool::new();
        pool.spawn(0, async { bail!(ErrorKind::FileOperationFailed, "Append failed") });
        pool.spawn(1, async { panic!("boom") });
        pool.spawn(2, async { Ok(WorkerReport::default()) });

        let err = pool.wait_all().await.unwrap_err();

        let mut kinds = err.kinds();
        kinds.sort_by_key(|kind| format!("{kind:?}"));
        assert_eq!(
            kinds,
            vec![ErrorKind::FileOperationFailed, ErrorKind::WorkerPanic]
        );
    }
}
