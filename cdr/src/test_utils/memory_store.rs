use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::bail;
use crate::destination::CdrStore;
use crate::error::{CdrResult, ErrorKind};
use crate::schema::{Cell, column_mapping};
use crate::types::CdrRecord;

/// A bound row as text, `None` standing for `NULL`.
pub type BoundRow = Vec<Option<String>>;

/// In-memory [`CdrStore`] keeping the values it would have bound.
///
/// Fails the first `failures` calls, or every call when built with
/// [`MemoryStore::always_failing`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<BoundRow>>>,
    calls: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails its first `failures` calls.
    pub fn failing(failures: usize) -> Self {
        let store = Self::default();
        store.failures.store(failures, Ordering::SeqCst);
        store
    }

    pub fn always_failing() -> Self {
        Self::failing(usize::MAX)
    }

    /// Number of insert calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn rows(&self) -> Vec<BoundRow> {
        self.rows.lock().await.clone()
    }
}

impl CdrStore for MemoryStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn insert_batch(&self, records: &[CdrRecord]) -> CdrResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if fail {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Simulated insert failure"
            );
        }

        let mapping = column_mapping();
        let bound = records
            .iter()
            .map(|record| {
                mapping
                    .cells(record)
                    .into_iter()
                    .map(|cell| match cell {
                        Cell::BigInt(value) => value.map(|v| v.to_string()),
                        Cell::Int(value) => value.map(|v| v.to_string()),
                        Cell::Text(value) => value.map(str::to_string),
                    })
                    .collect()
            })
            .collect::<Vec<BoundRow>>();

        self.rows.lock().await.extend(bound);

        Ok(())
    }
}
