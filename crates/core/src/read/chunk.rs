//! Chunk assembler (component H), spec.md §4.H.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChunkError;
use crate::external::StorageEngine;

/// Ordered list of chunk keys plus declared total size and schema id,
/// spec.md §3 "ChunkedValueManifest". Produced by the write path (out of
/// scope here), consumed by the assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkedValueManifest {
    pub chunk_keys: Vec<Vec<u8>>,
    pub total_size: usize,
    pub schema_id: u32,
}

/// Parameterizes chunk reassembly over a "chunks container" type and a
/// "value" type, spec.md §4.H. One adapter per read-op kind: byte-record
/// (point-get), typed-record (batch-get), decoded-record (compute).
#[async_trait]
pub trait ChunkingAdapter: Send + Sync {
    type Container: Send;
    type Value: Send;

    fn new_container(&self, manifest: &ChunkedValueManifest) -> Self::Container;
    fn add_chunk_into_container(&self, container: &mut Self::Container, chunk_index: usize, bytes: Vec<u8>);
    fn construct_value(&self, schema_id: u32, container: Self::Container) -> Result<Self::Value, ChunkError>;
    /// Decodes a single, non-chunked storage record directly into a value.
    fn decode_direct(&self, schema_id: u32, bytes: Vec<u8>) -> Result<Self::Value, ChunkError>;
}

pub struct ChunkAssembler<'a> {
    storage: &'a dyn StorageEngine,
}

impl<'a> ChunkAssembler<'a> {
    pub fn new(storage: &'a dyn StorageEngine) -> Self {
        Self { storage }
    }

    /// Fetches and assembles the value at `(partition, key)`. `chunked`
    /// comes from the metadata retriever collaborator (spec.md §6
    /// `isStoreVersionChunked`); this assembler never streams partial
    /// results, and a missing chunk is a hard error.
    pub async fn get<A: ChunkingAdapter>(
        &self,
        adapter: &A,
        partition: u32,
        key: &[u8],
        schema_id: u32,
        chunked: bool,
    ) -> Result<Option<A::Value>, ChunkError> {
        if !chunked {
            return match self.storage.get(partition, key).await.map_err(ChunkError::StorageRead)? {
                None => Ok(None),
                Some(bytes) => adapter.decode_direct(schema_id, bytes).map(Some),
            };
        }

        let Some(manifest_bytes) = self.storage.get(partition, key).await.map_err(ChunkError::StorageRead)? else {
            return Ok(None);
        };
        let manifest: ChunkedValueManifest = serde_json::from_slice(&manifest_bytes).map_err(|e| ChunkError::Decode(e.into()))?;

        let mut container = adapter.new_container(&manifest);
        for (index, chunk_key) in manifest.chunk_keys.iter().enumerate() {
            let bytes = self
                .storage
                .get(partition, chunk_key)
                .await
                .map_err(ChunkError::StorageRead)?
                .ok_or(ChunkError::MissingChunk {
                    index,
                    total: manifest.chunk_keys.len(),
                })?;
            adapter.add_chunk_into_container(&mut container, index, bytes);
        }

        adapter.construct_value(manifest.schema_id, container).map(Some)
    }
}

/// A `ChunkingAdapter` whose value is just the reassembled raw bytes, used
/// for point-get.
pub struct ByteRecordAdapter;

#[async_trait]
impl ChunkingAdapter for ByteRecordAdapter {
    type Container = Vec<Option<Vec<u8>>>;
    type Value = Vec<u8>;

    fn new_container(&self, manifest: &ChunkedValueManifest) -> Self::Container {
        vec![None; manifest.chunk_keys.len()]
    }

    fn add_chunk_into_container(&self, container: &mut Self::Container, chunk_index: usize, bytes: Vec<u8>) {
        container[chunk_index] = Some(bytes);
    }

    fn construct_value(&self, _schema_id: u32, container: Self::Container) -> Result<Self::Value, ChunkError> {
        let mut out = Vec::new();
        for chunk in container {
            out.extend(chunk.ok_or(ChunkError::Missing)?);
        }
        Ok(out)
    }

    fn decode_direct(&self, _schema_id: u32, bytes: Vec<u8>) -> Result<Self::Value, ChunkError> {
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStorage {
        records: parking_lot::Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    }

    #[at]
    impl StorageEngine for FakeStorage {
        async fn get(&self, _partition: u32, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(self.records.lock().get(key).cloned())
        }
    }

    #[tokio::test]
    async fn round_trips_chunked_value() {
        let storage = FakeStorage::default();
        let payload = b"the quick brown fox jumps over the lazy dog".to_vec();
        let chunks: Vec<Vec<u8>> = payload.chunks(10).map(|c| c.to_vec()).collect();
        let manifest = ChunkedValueManifest {
            chunk_keys: (0..chunks.len()).map(|i| format!("chunk-{i}").into_bytes()).collect(),
            total_size: payload.len(),
            schema_id: 7,
        };
        storage
            .records
            .lock()
            .insert(b"manifest-key".to_vec(), serde_json::to_vec(&manifest).unwrap());
        for (key, bytes) in manifest.chunk_keys.iter().zip(chunks.iter()) {
            storage.records.lock().insert(key.clone(), bytes.clone());
        }

        let assembler = ChunkAssembler::new(&storage);
        let value = assembler
            .get(&ByteRecordAdapter, 0, b"manifest-key", 7, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, payload);
    }

    #[tokio::test]
    async fn missing_chunk_is_hard_error() {
        let storage = FakeStorage::default();
        let manifest = ChunkedValueManifest {
            chunk_keys: vec![b"chunk-0".to_vec()],
            total_size: 1,
            schema_id: 1,
        };
        storage
            .records
            .lock()
            .insert(b"manifest-key".to_vec(), serde_json::to_vec(&manifest).unwrap());
        // chunk-0 deliberately not inserted.

        let assembler = ChunkAssembler::new(&storage);
        let err = assembler
            .get(&ByteRecordAdapter, 0, b"manifest-key", 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ChunkError::MissingChunk { index: 0, total: 1 }));
    }
}
