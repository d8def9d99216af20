//! Per-worker object cache (component K): each read worker owns a reusable
//! scratch buffer and two small LRU caches, so a hot loop of gets and
//! computes does not allocate and does not touch another worker's state.
//! Built on `LendingPool` so "checking out a worker" and "checking out its
//! cache" are the same operation.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::external::schema_registry::ValueSchema;
use crate::read::compute::ValidatedPipeline;
use crate::util::lending_pool::LendingPool;

const DEFAULT_SCRATCH_CAPACITY: usize = 1024 * 1024;

/// State private to one worker: a scratch buffer for serialization
/// round-trips, and the two prototype caches the worker's gets and computes
/// consult before going to the schema registry or revalidating a pipeline.
pub struct WorkerObjectCache {
    pub scratch: Vec<u8>,
    value_schemas: LruCache<(String, u32), Arc<ValueSchema>>,
    pipelines: LruCache<String, Arc<ValidatedPipeline>>,
}

impl WorkerObjectCache {
    pub fn new(scratch_capacity: usize, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            scratch: Vec::with_capacity(scratch_capacity),
            value_schemas: LruCache::new(capacity),
            pipelines: LruCache::new(capacity),
        }
    }

    pub fn reset_scratch(&mut self) {
        self.scratch.clear();
    }

    pub fn value_schema(&mut self, store: &str, schema_id: u32) -> Option<Arc<ValueSchema>> {
        self.value_schemas.get(&(store.to_owned(), schema_id)).cloned()
    }

    pub fn put_value_schema(&mut self, store: &str, schema: Arc<ValueSchema>) {
        self.value_schemas.put((store.to_owned(), schema.schema_id), schema);
    }

    pub fn pipeline(&mut self, key: &str) -> Option<Arc<ValidatedPipeline>> {
        self.pipelines.get(key).cloned()
    }

    pub fn put_pipeline(&mut self, key: impl Into<String>, pipeline: Arc<ValidatedPipeline>) {
        self.pipelines.put(key.into(), pipeline);
    }
}

pub type ObjectCachePool = LendingPool<WorkerObjectCache>;

/// Builds a pool with one `WorkerObjectCache` per worker slot. `worker_count`
/// should match the size of the read/compute worker pool this cache backs,
/// so every concurrently-running worker has an exclusive cache to check out.
pub fn build_pool(worker_count: usize, cache_capacity: usize) -> ObjectCachePool {
    (0..worker_count)
        .map(|_| WorkerObjectCache::new(DEFAULT_SCRATCH_CAPACITY, cache_capacity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checked_out_caches_are_exclusive_and_return_on_drop() {
        let pool = build_pool(1, 4);
        assert_eq!(pool.num_available(), 1);
        {
            let mut lent = pool.request().await.unwrap();
            assert_eq!(pool.num_available(), 0);
            lent.scratch.extend_from_slice(b"hello");
        }
        assert_eq!(pool.num_available(), 1);
        let mut lent = pool.request().await.unwrap();
        assert_eq!(lent.scratch, b"hello");
        lent.reset_scratch();
        assert!(lent.scratch.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_entry_past_capacity() {
        let mut cache = WorkerObjectCache::new(16, 2);
        let schema_a = Arc::new(ValueSchema { schema_id: 1, fields: vec![] });
        let schema_b = Arc::new(ValueSchema { schema_id: 2, fields: vec![] });
        let schema_c = Arc::new(ValueSchema { schema_id: 3, fields: vec![] });
        cache.put_value_schema("s", schema_a.clone());
        cache.put_value_schema("s", schema_b.clone());
        cache.put_value_schema("s", schema_c.clone());
        assert!(cache.value_schema("s", 1).is_none());
        assert!(cache.value_schema("s", 3).is_some());
    }
}
