use std::sync::Arc;
use std::time::Duration;

use finroute_models::Table;
use moka::future::Cache;

/// In-memory table cache backed by moka, keyed by source reference.
///
/// Entries are evicted after TTL or when capacity is exceeded.
pub struct MemoryCache {
    inner: Cache<String, Arc<Table>>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, reference: &str) -> Option<Arc<Table>> {
        self.inner.get(reference).await
    }

    pub async fn insert(&self, reference: String, table: Arc<Table>) {
        self.inner.insert(reference, table).await;
    }

    pub async fn invalidate(&self, reference: &str) {
        self.inner.invalidate(reference).await;
    }

    /// Entry count after pending evictions and invalidations are applied.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
