//! Lazy draining of the queue into sorted [`CdrBatch`]es.

use futures::{Stream, StreamExt, stream};
use metrics::counter;
use tracing::{debug, warn};

use crate::codec;
use crate::error::CdrResult;
use crate::metrics::{CDR_RECORDS_FETCHED_TOTAL, CDR_RECORDS_MALFORMED_TOTAL};
use crate::queue::CdrQueue;
use crate::types::{CdrBatch, CdrRecord};

/// Splits `total_budget` records into pop sizes of at most `batch_size`.
///
/// Full chunks come first, followed by the remainder when it is not zero. A zero
/// `batch_size` or `total_budget` yields no chunk.
pub fn plan_chunks(batch_size: u64, total_budget: u64) -> Vec<u64> {
    if batch_size == 0 || total_budget == 0 {
        return Vec::new();
    }

    let full_chunks = total_budget / batch_size;
    let remainder = total_budget % batch_size;

    let mut chunks = vec![batch_size; full_chunks as usize];
    if remainder > 0 {
        chunks.push(remainder);
    }

    chunks
}

/// Drains a queue into sorted batches.
#[derive(Debug, Clone)]
pub struct BatchFetcher<Q> {
    queue: Q,
}

impl<Q> BatchFetcher<Q>
where
    Q: CdrQueue,
{
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }

    /// Returns a stream popping `total_budget` records from `key` in chunks of at most
    /// `batch_size`.
    ///
    /// Each chunk is popped only when the previous batch has been consumed. Entries
    /// that fail to decode are logged and skipped. A short pop produces a smaller,
    /// possibly empty, batch. A queue error is yielded as an item and callers are
    /// expected to stop consuming after it.
    pub fn fetch<'a>(
        &'a self,
        key: &'a str,
        batch_size: u64,
        total_budget: u64,
    ) -> impl Stream<Item = CdrResult<CdrBatch>> + Send + 'a
    where
        Q: Sync,
    {
        stream::iter(plan_chunks(batch_size, total_budget))
            .then(move |chunk_size| self.fetch_chunk(key, chunk_size))
    }

    async fn fetch_chunk(&self, key: &str, chunk_size: u64) -> CdrResult<CdrBatch> {
        let entries = self.queue.pop_front(key, chunk_size as usize).await?;
        let popped = entries.len();

        let records: Vec<CdrRecord> = entries
            .iter()
            .filter_map(|entry| match codec::decode(entry) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(error = %err, entry = %entry, "dropping malformed queue entry");
                    None
                }
            })
            .collect();

        let malformed = popped - records.len();
        counter!(CDR_RECORDS_FETCHED_TOTAL).increment(records.len() as u64);
        if malformed > 0 {
            counter!(CDR_RECORDS_MALFORMED_TOTAL).increment(malformed as u64);
        }

        debug!(key, requested = chunk_size, popped, malformed, "popped chunk");

        Ok(CdrBatch::new(records))
    }
}
