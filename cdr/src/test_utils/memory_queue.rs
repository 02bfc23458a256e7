use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{CdrResult, ErrorKind};
use crate::queue::CdrQueue;

#[derive(Debug, Default)]
struct Inner {
    lists: HashMap<String, VecDeque<String>>,
}

/// In-memory [`CdrQueue`] with atomic pops.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<Inner>>,
    fail_pops: Arc<AtomicBool>,
    pop_calls: Arc<AtomicUsize>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entries` to the tail of `key`.
    pub async fn push_all(&self, key: &str, entries: Vec<String>) {
        let mut inner = self.inner.lock().await;
        inner
            .lists
            .entry(key.to_string())
            .or_default()
            .extend(entries);
    }

    pub async fn len(&self, key: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.lists.get(key).map_or(0, VecDeque::len)
    }

    /// Makes every subsequent pop fail with a queue error.
    pub fn fail_pops(&self, fail: bool) {
        self.fail_pops.store(fail, Ordering::SeqCst);
    }

    /// Number of pops issued so far.
    pub fn pop_calls(&self) -> usize {
        self.pop_calls.load(Ordering::SeqCst)
    }
}

impl CdrQueue for MemoryQueue {
    async fn length(&self, key: &str) -> CdrResult<u64> {
        Ok(self.len(key).await as u64)
    }

    async fn pop_front(&self, key: &str, count: usize) -> CdrResult<Vec<String>> {
        self.pop_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_pops.load(Ordering::SeqCst) {
            bail!(
                ErrorKind::QueueOperationFailed,
                "Simulated pop failure",
                key.to_string()
            );
        }

        let mut inner = self.inner.lock().await;
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(Vec::new());
        };

        let count = count.min(list.len());
        Ok(list.drain(..count).collect())
    }
}
