//! Read dispatcher (component G), spec.md §4.G: the only read-path entry
//! point a network thread calls. Routes by request kind onto the get or
//! compute worker pool, attaches queue-depth/submission-wait metrics to
//! every response, and never blocks the calling thread — all work happens
//! behind an `.await` inside a pool slot.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ReadError;
use crate::external::{DiskHealth, MetadataRetriever, SchemaRegistry, StorageEngine};
use crate::metrics::Metrics;
use crate::read::chunk::{ByteRecordAdapter, ChunkAssembler};
use crate::read::compute::ComputeEvaluator;
use crate::read::messages::{
    BatchGetKey, BatchGetRequest, CancellationToken, ComputeRequest, ErrorStatus, KeyedValue, PointGetRequest,
    ReadRequest, ReadResponse, ReadResponseMeta,
};
use crate::read::object_cache::ObjectCachePool;
use crate::read::partition::PartitionResolver;
use crate::read::worker_pool::WorkerPool;

pub struct ReadDispatcherConfig {
    pub parallel_chunk_size: usize,
}

pub struct ReadDispatcher {
    storage: Arc<dyn StorageEngine>,
    metadata: Arc<dyn MetadataRetriever>,
    schemas: Arc<dyn SchemaRegistry>,
    disk_health: Arc<dyn DiskHealth>,
    partitions: Arc<PartitionResolver>,
    get_pool: WorkerPool,
    compute_pool: WorkerPool,
    compute_cache: ObjectCachePool,
    config: ReadDispatcherConfig,
    metrics: Arc<Metrics>,
}

/// Outcome of one sub-chunk's worth of batch-get keys, run inside a single
/// pool task.
enum BatchTaskOutcome {
    Missing { key_index: i64 },
    EarlyTerminated,
}

impl ReadDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageEngine>,
        metadata: Arc<dyn MetadataRetriever>,
        schemas: Arc<dyn SchemaRegistry>,
        disk_health: Arc<dyn DiskHealth>,
        partitions: Arc<PartitionResolver>,
        get_pool: WorkerPool,
        compute_pool: WorkerPool,
        compute_cache: ObjectCachePool,
        config: ReadDispatcherConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            storage,
            metadata,
            schemas,
            disk_health,
            partitions,
            get_pool,
            compute_pool,
            compute_cache,
            config,
            metrics,
        }
    }

    pub async fn dispatch(&self, request: ReadRequest) -> (ReadResponse, ReadResponseMeta) {
        match request {
            ReadRequest::PointGet(req) => self.point_get(req).await,
            ReadRequest::BatchGet(req) => self.batch_get(req).await,
            ReadRequest::Compute(req) => self.compute(req).await,
            ReadRequest::HealthCheck => (ReadResponse::Health(self.disk_health.status()), ReadResponseMeta::default()),
            ReadRequest::DictionaryFetch { store } => {
                self.metrics.read_requests_total.with_label_values(&["dictionary_fetch"]).inc();
                match self.metadata.compression_dictionary(store.as_str()).await {
                    Ok(dict) => (ReadResponse::Dictionary(dict), ReadResponseMeta::default()),
                    Err(e) => (storage_error(e.to_string()), ReadResponseMeta::default()),
                }
            }
            ReadRequest::Admin => (ReadResponse::Admin("ok".to_owned()), ReadResponseMeta::default()),
        }
    }

    async fn point_get(&self, req: PointGetRequest) -> (ReadResponse, ReadResponseMeta) {
        self.metrics.read_requests_total.with_label_values(&["point_get"]).inc();
        if req.early_termination.is_cancelled() {
            return early_terminated_response();
        }
        let chunked = match self.metadata.is_store_version_chunked(req.store.as_str()).await {
            Ok(c) => c,
            Err(e) => return (storage_error(e.to_string()), ReadResponseMeta::default()),
        };
        let partition = self.partitions.resolve(req.store.as_str(), req.user_partition, &req.key);
        let assembler = ChunkAssembler::new(self.storage.as_ref());
        let key = req.key.clone();
        let cancel = req.early_termination.clone();

        let submitted = self
            .get_pool
            .submit(async move {
                if cancel.is_cancelled() {
                    return Err(ReadError::EarlyTermination);
                }
                Ok(assembler.get(&ByteRecordAdapter, partition, &key, 0, chunked).await?)
            })
            .await;

        match submitted {
            Ok((Ok(value), wait)) => {
                self.record_submission(&["point_get"], wait);
                (ReadResponse::Value(value), self.meta(wait))
            }
            Ok((Err(ReadError::EarlyTermination), wait)) => {
                self.record_submission(&["point_get"], wait);
                (early_terminated(), self.meta(wait))
            }
            Ok((Err(e), wait)) => {
                self.record_submission(&["point_get"], wait);
                (
                    ReadResponse::Error { status: ErrorStatus::StorageError, reason: e.to_string() },
                    self.meta(wait),
                )
            }
            Err(_) => (
                ReadResponse::Error { status: ErrorStatus::StorageError, reason: "worker pool closed".to_owned() },
                ReadResponseMeta::default(),
            ),
        }
    }

    async fn batch_get(&self, req: BatchGetRequest) -> (ReadResponse, ReadResponseMeta) {
        self.metrics.read_requests_total.with_label_values(&["batch_get"]).inc();
        if req.early_termination.is_cancelled() {
            return early_terminated_response();
        }
        let chunked = match self.metadata.is_store_version_chunked(req.store.as_str()).await {
            Ok(c) => c,
            Err(e) => return (storage_error(e.to_string()), ReadResponseMeta::default()),
        };

        let results: Arc<Mutex<Vec<KeyedValue>>> = Arc::new(Mutex::new(Vec::with_capacity(req.keys.len())));
        let mut submissions = Vec::new();
        for chunk in req.keys.chunks(self.config.parallel_chunk_size.max(1)) {
            let chunk = chunk.to_vec();
            let results = results.clone();
            let assembler = ChunkAssembler::new(self.storage.as_ref());
            let streaming = req.streaming;
            let cancel = req.early_termination.clone();
            submissions.push(self.get_pool.submit(async move {
                if cancel.is_cancelled() {
                    return Err(BatchTaskOutcome::EarlyTerminated);
                }
                for key in &chunk {
                    match fetch_one(&assembler, key, chunked).await {
                        Ok(Some(bytes)) => results.lock().push(KeyedValue { key_index: key.key_index, value: Some(bytes) }),
                        Ok(None) if streaming => {
                            results.lock().push(KeyedValue { key_index: -key.key_index, value: Some(Vec::new()) })
                        }
                        Ok(None) => return Err(BatchTaskOutcome::Missing { key_index: key.key_index }),
                        Err(_) => return Err(BatchTaskOutcome::Missing { key_index: key.key_index }),
                    }
                }
                Ok(())
            }));
        }

        let start = std::time::Instant::now();
        let outcomes = futures::future::join_all(submissions).await;
        let wait = start.elapsed();
        self.record_submission(&["batch_get"], wait);

        for outcome in outcomes {
            match outcome {
                Ok((Ok(()), _)) => {}
                Ok((Err(BatchTaskOutcome::EarlyTerminated), _)) => return (early_terminated(), self.meta(wait)),
                Ok((Err(BatchTaskOutcome::Missing { key_index }), _)) => {
                    return (
                        ReadResponse::Error {
                            status: ErrorStatus::StorageError,
                            reason: format!("key at index {key_index} not found"),
                        },
                        self.meta(wait),
                    )
                }
                Err(_) => {
                    return (
                        ReadResponse::Error { status: ErrorStatus::StorageError, reason: "worker pool closed".to_owned() },
                        ReadResponseMeta::default(),
                    )
                }
            }
        }

        let values = Arc::try_unwrap(results).map(Mutex::into_inner).unwrap_or_default();
        (ReadResponse::Batch(values), self.meta(wait))
    }

    async fn compute(&self, req: ComputeRequest) -> (ReadResponse, ReadResponseMeta) {
        self.metrics.read_requests_total.with_label_values(&["compute"]).inc();
        if req.early_termination.is_cancelled() {
            return early_terminated_response();
        }
        let value_schema = match self.schemas.get_value_schema(req.store.as_str(), req.value_schema_id).await {
            Ok(Some(schema)) => schema,
            Ok(None) => {
                return (
                    ReadResponse::Error {
                        status: ErrorStatus::BadRequest,
                        reason: format!("unknown value schema {}", req.value_schema_id),
                    },
                    ReadResponseMeta::default(),
                )
            }
            Err(e) => return (storage_error(e.to_string()), ReadResponseMeta::default()),
        };
        let chunked = match self.metadata.is_store_version_chunked(req.store.as_str()).await {
            Ok(c) => c,
            Err(e) => return (storage_error(e.to_string()), ReadResponseMeta::default()),
        };

        let cache_key = format!("{}::{}::{}", req.store.as_str(), req.value_schema_id, req.result_schema);
        let evaluator = ComputeEvaluator::new(self.storage.as_ref());
        let mut cache = match self.compute_cache.request().await {
            Ok(cache) => cache,
            Err(_) => {
                return (
                    ReadResponse::Error {
                        status: ErrorStatus::StorageError,
                        reason: "object cache pool closed".to_owned(),
                    },
                    ReadResponseMeta::default(),
                )
            }
        };

        let mut values = Vec::with_capacity(req.keys.len());
        let start = std::time::Instant::now();
        for key in &req.keys {
            let partition = self.partitions.resolve(req.store.as_str(), key.partition_id, &key.key_bytes);
            let cancel = req.early_termination.clone();
            let fut = evaluator.evaluate_one(
                &cache_key,
                partition,
                &key.key_bytes,
                key.key_index,
                &value_schema,
                &req.operations,
                chunked,
                &mut cache,
            );
            let wrapped = async move {
                if cancel.is_cancelled() {
                    return Err(ReadError::EarlyTermination);
                }
                Ok(fut.await?)
            };
            let (outcome, _wait) = match self.compute_pool.submit(wrapped).await {
                Ok(pair) => pair,
                Err(_) => {
                    return (
                        ReadResponse::Error { status: ErrorStatus::StorageError, reason: "worker pool closed".to_owned() },
                        ReadResponseMeta::default(),
                    )
                }
            };
            match outcome {
                Ok(kv) if kv.value.is_some() => {
                    for op in &req.operations {
                        self.metrics.compute_op_total.with_label_values(&[op.name()]).inc();
                    }
                    values.push(kv);
                }
                Ok(kv) if req.streaming => values.push(KeyedValue { key_index: -kv.key_index, value: None }),
                Ok(_) => {
                    return (
                        ReadResponse::Error {
                            status: ErrorStatus::StorageError,
                            reason: format!("key at index {} not found", key.key_index),
                        },
                        ReadResponseMeta::default(),
                    )
                }
                Err(ReadError::EarlyTermination) => return early_terminated_response(),
                Err(e) => {
                    return (
                        ReadResponse::Error { status: ErrorStatus::StorageError, reason: e.to_string() },
                        ReadResponseMeta::default(),
                    )
                }
            }
        }
        let wait = start.elapsed();
        self.record_submission(&["compute"], wait);
        (ReadResponse::Compute(values), self.meta(wait))
    }

    fn record_submission(&self, labels: &[&str], wait: std::time::Duration) {
        self.metrics
            .read_submission_wait_seconds
            .with_label_values(labels)
            .observe(wait.as_secs_f64());
    }

    fn meta(&self, wait: std::time::Duration) -> ReadResponseMeta {
        ReadResponseMeta {
            queue_depth: self.get_pool.queue_depth().max(0) as usize,
            submission_wait: wait,
        }
    }
}

async fn fetch_one(assembler: &ChunkAssembler<'_>, key: &BatchGetKey, chunked: bool) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(assembler.get(&ByteRecordAdapter, key.partition_id, &key.key_bytes, 0, chunked).await?)
}

fn storage_error(reason: String) -> ReadResponse {
    ReadResponse::Error { status: ErrorStatus::StorageError, reason }
}

fn early_terminated() -> ReadResponse {
    ReadResponse::Error {
        status: ErrorStatus::EarlyTerminated,
        reason: "request was terminated early before storage work began".to_owned(),
    }
}

fn early_terminated_response() -> (ReadResponse, ReadResponseMeta) {
    (early_terminated(), ReadResponseMeta::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::disk_health::HealthStatus;
    use crate::external::metadata::CompressionStrategy;
    use crate::external::schema_registry::InMemorySchemaRegistry;
    use crate::context::StoreName;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;

    #[derive(Default)]
    struct FakeStorage {
        records: Mutex<Map<Vec<u8>, Vec<u8>>>,
    }

    #[async_trait]
    impl StorageEngine for FakeStorage {
        async fn get(&self, _partition: u32, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(self.records.lock().get(key).cloned())
        }
    }

    struct FakeMetadata;

    #[async_trait]
    impl MetadataRetriever for FakeMetadata {
        async fn is_store_version_chunked(&self, _topic: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn compression_strategy(&self, _topic: &str) -> anyhow::Result<CompressionStrategy> {
            Ok(CompressionStrategy::None)
        }
        async fn compression_dictionary(&self, _topic: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn offset(&self, _topic: &str, _partition: u32) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    struct FakeDiskHealth;
    impl DiskHealth for FakeDiskHealth {
        fn status(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    fn dispatcher(storage: Arc<FakeStorage>) -> ReadDispatcher {
        let metrics = Arc::new(Metrics::new());
        ReadDispatcher::new(
            storage,
            Arc::new(FakeMetadata),
            Arc::new(InMemorySchemaRegistry::default()),
            Arc::new(FakeDiskHealth),
            Arc::new(PartitionResolver::new()),
            WorkerPool::new(4, metrics.read_queue_depth.with_label_values(&["get"])),
            WorkerPool::new(4, metrics.read_queue_depth.with_label_values(&["compute"])),
            crate::read::object_cache::build_pool(4, 16),
            ReadDispatcherConfig { parallel_chunk_size: 2 },
            metrics,
        )
    }

    #[tokio::test]
    async fn point_get_returns_stored_value() {
        let storage = Arc::new(FakeStorage::default());
        storage.records.lock().insert(b"k1".to_vec(), b"v1".to_vec());
        let dispatcher = dispatcher(storage);
        let (response, _meta) = dispatcher
            .dispatch(ReadRequest::PointGet(PointGetRequest {
                store: StoreName::new("store-a"),
                user_partition: 0,
                key: b"k1".to_vec(),
                early_termination: CancellationToken::new(),
            }))
            .await;
        assert!(matches!(response, ReadResponse::Value(Some(v)) if v == b"v1"));
    }

    #[tokio::test]
    async fn point_get_checked_before_queueing_skips_storage() {
        let storage = Arc::new(FakeStorage::default());
        storage.records.lock().insert(b"k1".to_vec(), b"v1".to_vec());
        let dispatcher = dispatcher(storage);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (response, _meta) = dispatcher
            .dispatch(ReadRequest::PointGet(PointGetRequest {
                store: StoreName::new("store-a"),
                user_partition: 0,
                key: b"k1".to_vec(),
                early_termination: cancel,
            }))
            .await;
        assert!(matches!(response, ReadResponse::Error { status: ErrorStatus::EarlyTerminated, .. }));
    }

    #[tokio::test]
    async fn batch_get_splits_across_parallel_chunks() {
        let storage = Arc::new(FakeStorage::default());
        for i in 0..5u8 {
            storage.records.lock().insert(vec![i], vec![i * 2]);
        }
        let dispatcher = dispatcher(storage);
        let keys = (0..5)
            .map(|i| BatchGetKey { partition_id: 0, key_bytes: vec![i], key_index: i as i64 })
            .collect();
        let (response, _meta) = dispatcher
            .dispatch(ReadRequest::BatchGet(BatchGetRequest { store: StoreName::new("store-a"), keys, streaming: false, early_termination: CancellationToken::new() }))
            .await;
        let ReadResponse::Batch(values) = response else { panic!("expected batch response") };
        assert_eq!(values.len(), 5);
    }

    #[tokio::test]
    async fn batch_get_non_streaming_fails_on_missing_key() {
        let storage = Arc::new(FakeStorage::default());
        let dispatcher = dispatcher(storage);
        let keys = vec![BatchGetKey { partition_id: 0, key_bytes: b"missing".to_vec(), key_index: 0 }];
        let (response, _meta) = dispatcher
            .dispatch(ReadRequest::BatchGet(BatchGetRequest { store: StoreName::new("store-a"), keys, streaming: false, early_termination: CancellationToken::new() }))
            .await;
        assert!(matches!(response, ReadResponse::Error { .. }));
    }

    #[tokio::test]
    async fn batch_get_streaming_yields_sentinel_for_missing_key() {
        let storage = Arc::new(FakeStorage::default());
        let dispatcher = dispatcher(storage);
        let keys = vec![BatchGetKey { partition_id: 0, key_bytes: b"missing".to_vec(), key_index: 3 }];
        let (response, _meta) = dispatcher
            .dispatch(ReadRequest::BatchGet(BatchGetRequest { store: StoreName::new("store-a"), keys, streaming: true, early_termination: CancellationToken::new() }))
            .await;
        let ReadResponse::Batch(values) = response else { panic!("expected batch response") };
        assert_eq!(values[0].key_index, -3);
    }

    #[tokio::test]
    async fn batch_get_checked_before_queueing_skips_storage() {
        let storage = Arc::new(FakeStorage::default());
        storage.records.lock().insert(vec![0], vec![1]);
        let dispatcher = dispatcher(storage);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let keys = vec![BatchGetKey { partition_id: 0, key_bytes: vec![0], key_index: 0 }];
        let (response, _meta) = dispatcher
            .dispatch(ReadRequest::BatchGet(BatchGetRequest {
                store: StoreName::new("store-a"),
                keys,
                streaming: false,
                early_termination: cancel,
            }))
            .await;
        assert!(matches!(response, ReadResponse::Error { status: ErrorStatus::EarlyTerminated, .. }));
    }

    #[tokio::test]
    async fn health_check_reports_disk_health() {
        let storage = Arc::new(FakeStorage::default());
        let dispatcher = dispatcher(storage);
        let (response, _meta) = dispatcher.dispatch(ReadRequest::HealthCheck).await;
        assert!(matches!(response, ReadResponse::Health(HealthStatus::Healthy)));
    }
}
