use std::future::Future;

use crate::error::CdrResult;

/// A FIFO list of serialized records shared by every ingester instance.
///
/// Pops must be atomic: two concurrent callers never receive the same entry.
pub trait CdrQueue {
    /// Returns the number of entries currently stored under `key`.
    fn length(&self, key: &str) -> impl Future<Output = CdrResult<u64>> + Send;

    /// Removes and returns up to `count` entries from the head of `key`.
    ///
    /// Returns fewer entries, possibly none, when the list is shorter than `count`.
    fn pop_front(&self, key: &str, count: usize)
    -> impl Future<Output = CdrResult<Vec<String>>> + Send;
}
