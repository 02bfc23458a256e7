use std::future::Future;

use crate::error::CdrResult;
use crate::types::CdrRecord;

/// Relational storage for records.
pub trait CdrStore {
    /// Returns the name of the store, used in logs and metric labels.
    fn name() -> &'static str;

    /// Inserts every record of `records` atomically.
    ///
    /// Either all records are stored or none is, so a failed call can be retried
    /// with the same input.
    fn insert_batch(&self, records: &[CdrRecord]) -> impl Future<Output = CdrResult<()>> + Send;
}
