//! Durable writes of batches to a [`CdrStore`] with bounded retry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{error, warn};

use crate::destination::CdrStore;
use crate::error::CdrError;
use crate::metrics::{
    CDR_BATCHES_DROPPED_TOTAL, CDR_BATCHES_WRITTEN_TOTAL, CDR_RECORDS_DROPPED_TOTAL,
    CDR_WRITE_ATTEMPTS_TOTAL, SINK_LABEL,
};
use crate::types::{CdrBatch, CdrRecord};

/// Callback receiving batches given up after the last attempt, with the last error.
pub type DeadLetterHook = Arc<dyn Fn(&[CdrRecord], &CdrError) + Send + Sync>;

/// Bounded retry settings of a [`DurableWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per batch, the first one included.
    pub max_attempts: u32,
    /// Pause between two attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Result of [`DurableWriter::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The batch was stored by the `attempts`-th call.
    Written { attempts: u32 },
    /// Every attempt failed and the batch was discarded.
    Dropped { attempts: u32 },
    /// The store was not called, either because the batch was empty or because no
    /// attempt is allowed.
    Skipped,
}

/// Writes batches to a [`CdrStore`], retrying the whole batch on failure.
///
/// Failures never propagate: a batch that cannot be stored within the attempt budget
/// is logged, counted and handed to the dead-letter hook if one is set. It is not put
/// back in the queue.
#[derive(Clone)]
pub struct DurableWriter<S> {
    store: S,
    policy: RetryPolicy,
    dead_letter: Option<DeadLetterHook>,
}

impl<S> DurableWriter<S>
where
    S: CdrStore,
{
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            dead_letter: None,
        }
    }

    pub fn with_dead_letter(mut self, hook: DeadLetterHook) -> Self {
        self.dead_letter = Some(hook);
        self
    }

    pub async fn write(&self, batch: &CdrBatch) -> WriteOutcome {
        if batch.is_empty() {
            return WriteOutcome::Skipped;
        }

        if self.policy.max_attempts == 0 {
            warn!(
                records = batch.len(),
                "no insert attempt allowed, discarding batch"
            );
            counter!(CDR_RECORDS_DROPPED_TOTAL, SINK_LABEL => S::name())
                .increment(batch.len() as u64);
            return WriteOutcome::Skipped;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            counter!(CDR_WRITE_ATTEMPTS_TOTAL, SINK_LABEL => S::name()).increment(1);

            let err = match self.store.insert_batch(batch.records()).await {
                Ok(()) => {
                    counter!(CDR_BATCHES_WRITTEN_TOTAL, SINK_LABEL => S::name()).increment(1);
                    return WriteOutcome::Written { attempts: attempt };
                }
                Err(err) => err,
            };

            if attempt >= self.policy.max_attempts {
                error!(
                    store = S::name(),
                    attempts = attempt,
                    records = batch.len(),
                    error = %err,
                    "insert attempts exhausted, dropping batch"
                );
                counter!(CDR_BATCHES_DROPPED_TOTAL, SINK_LABEL => S::name()).increment(1);
                counter!(CDR_RECORDS_DROPPED_TOTAL, SINK_LABEL => S::name())
                    .increment(batch.len() as u64);
                if let Some(hook) = &self.dead_letter {
                    hook(batch.records(), &err);
                }

                return WriteOutcome::Dropped { attempts: attempt };
            }

            warn!(
                store = S::name(),
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %err,
                "insert failed, retrying batch"
            );

            if !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for DurableWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableWriter")
            .field("store", &self.store)
            .field("policy", &self.policy)
            .field("dead_letter", &self.dead_letter.is_some())
            .finish()
    }
}
