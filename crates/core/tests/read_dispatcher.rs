//! End-to-end coverage of the read dispatcher against chunked storage
//! values, exercising spec.md §8 scenario S5: a multi-megabyte chunked
//! value, a compute pipeline evaluated over many keys, and the streaming
//! missing-key sentinel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use vkv_core::context::StoreName;
use vkv_core::external::disk_health::HealthStatus;
use vkv_core::external::metadata::CompressionStrategy;
use vkv_core::external::schema_registry::{FieldKind, FieldSpec, InMemorySchemaRegistry, ValueSchema};
use vkv_core::external::{DiskHealth, MetadataRetriever, StorageEngine};
use vkv_core::metrics::Metrics;
use vkv_core::read::messages::{BatchGetKey, CancellationToken, ComputeOp, ComputeRequest, ReadRequest, ReadResponse};
use vkv_core::read::{PartitionResolver, ReadDispatcher, ReadDispatcherConfig, WorkerPool};

#[derive(Default)]
struct FakeStorage {
    records: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

#[async_trait]
impl StorageEngine for FakeStorage {
    async fn get(&self, _partition: u32, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.records.lock().get(key).cloned())
    }
}

struct AlwaysChunked;

#[async_trait]
impl MetadataRetriever for AlwaysChunked {
    async fn is_store_version_chunked(&self, _topic: &str) -> anyhow::Result<bool> {
        Ok(true)
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

/// Stores `value` as a three-chunk manifest, roughly 1 MiB per chunk.
fn store_chunked_record(storage: &FakeStorage, manifest_key: &[u8], record_json: &[u8]) {
    let chunk_len = (record_json.len() / 3).max(1);
    let chunks: Vec<Vec<u8>> = record_json.chunks(chunk_len).map(|c| c.to_vec()).collect();
    let chunk_keys: Vec<Vec<u8>> = (0..chunks.len())
        .map(|i| [manifest_key, format!("-chunk-{i}").as_bytes()].concat())
        .collect();
    let manifest = vkv_core::read::chunk::ChunkedValueManifest {
        chunk_keys: chunk_keys.clone(),
        total_size: record_json.len(),
        schema_id: 1,
    };
    let mut records = storage.records.lock();
    records.insert(manifest_key.to_vec(), serde_json::to_vec(&manifest).unwrap());
    for (key, bytes) in chunk_keys.iter().zip(chunks.iter()) {
        records.insert(key.clone(), bytes.clone());
    }
}

#[tokio::test]
async fn s5_chunked_compute_with_streaming_sentinel_for_missing_key() {
    let storage = Arc::new(FakeStorage::default());
    let schemas = Arc::new(InMemorySchemaRegistry::default());
    schemas.insert(
        "vectors",
        ValueSchema {
            schema_id: 1,
            fields: vec![FieldSpec { name: "f".to_owned(), kind: FieldKind::F32Vector, nullable: false }],
        },
    );

    // A single vector large enough that, encoded as JSON, the record spans
    // over a megabyte split across 3 chunks.
    let vector: Vec<f32> = (0..300_000).map(|i| (i % 7) as f32).collect();
    let record_json = serde_json::to_vec(&serde_json::json!({ "f": vector })).unwrap();
    assert!(record_json.len() > 1024 * 1024);

    const NUM_KEYS: usize = 50;
    const MISSING_INDEX: usize = 17;
    for i in 0..NUM_KEYS {
        if i == MISSING_INDEX {
            continue;
        }
        let key = format!("key-{i}").into_bytes();
        store_chunked_record(&storage, &key, &record_json);
    }

    let metrics = Arc::new(Metrics::new());
    let dispatcher = ReadDispatcher::new(
        storage,
        Arc::new(AlwaysChunked),
        schemas,
        Arc::new(FakeDiskHealth),
        Arc::new(PartitionResolver::new()),
        WorkerPool::new(4, metrics.read_queue_depth.with_label_values(&["get"])),
        WorkerPool::new(4, metrics.read_queue_depth.with_label_values(&["compute"])),
        vkv_core::read::build_pool(4, 16),
        ReadDispatcherConfig { parallel_chunk_size: 8 },
        metrics,
    );

    let keys = (0..NUM_KEYS)
        .map(|i| BatchGetKey { partition_id: 0, key_bytes: format!("key-{i}").into_bytes(), key_index: i as i64 })
        .collect();

    let (response, _meta) = dispatcher
        .dispatch(ReadRequest::Compute(ComputeRequest {
            store: StoreName::new("vectors"),
            keys,
            value_schema_id: 1,
            result_schema: "dot-with-ones".to_owned(),
            operations: vec![ComputeOp::DotProduct {
                input_field: "f".to_owned(),
                result_field: "score".to_owned(),
                with: vec![1.0; 300_000],
            }],
            streaming: true,
            early_termination: CancellationToken::new(),
        }))
        .await;

    let ReadResponse::Compute(values) = response else { panic!("expected compute response, got {response:?}") };
    assert_eq!(values.len(), NUM_KEYS);

    let missing = &values[MISSING_INDEX];
    assert_eq!(missing.key_index, -(MISSING_INDEX as i64));
    assert!(missing.value.is_none());

    for (i, kv) in values.iter().enumerate() {
        if i == MISSING_INDEX {
            continue;
        }
        assert_eq!(kv.key_index, i as i64);
        let result: HashMap<String, serde_json::Value> = serde_json::from_slice(kv.value.as_ref().unwrap()).unwrap();
        assert!(result["score"].as_f64().unwrap() > 0.0);
    }
}

#[tokio::test]
async fn compute_non_streaming_fails_whole_request_on_missing_key() {
    let storage = Arc::new(FakeStorage::default());
    let schemas = Arc::new(InMemorySchemaRegistry::default());
    schemas.insert(
        "vectors",
        ValueSchema {
            schema_id: 1,
            fields: vec![FieldSpec { name: "f".to_owned(), kind: FieldKind::F32Vector, nullable: false }],
        },
    );
    let metrics = Arc::new(Metrics::new());
    let dispatcher = ReadDispatcher::new(
        storage,
        Arc::new(AlwaysChunked),
        schemas,
        Arc::new(FakeDiskHealth),
        Arc::new(PartitionResolver::new()),
        WorkerPool::new(2, metrics.read_queue_depth.with_label_values(&["get"])),
        WorkerPool::new(2, metrics.read_queue_depth.with_label_values(&["compute"])),
        vkv_core::read::build_pool(2, 16),
        ReadDispatcherConfig { parallel_chunk_size: 4 },
        metrics,
    );

    let keys = vec![BatchGetKey { partition_id: 0, key_bytes: b"missing".to_vec(), key_index: 0 }];
    let (response, _meta) = dispatcher
        .dispatch(ReadRequest::Compute(ComputeRequest {
            store: StoreName::new("vectors"),
            keys,
            value_schema_id: 1,
            result_schema: "dot-with-ones".to_owned(),
            operations: vec![ComputeOp::DotProduct {
                input_field: "f".to_owned(),
                result_field: "score".to_owned(),
                with: vec![1.0],
            }],
            streaming: false,
            early_termination: CancellationToken::new(),
        }))
        .await;

    assert!(matches!(response, ReadResponse::Error { .. }));
}
