//! The local storage engine: keyed byte-blob get with chunk lookup.
//! spec.md §6 "Storage engine (out)".

use async_trait::async_trait;

#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Returns the raw bytes stored at `(partition, key_bytes)`, or `None`
    /// if absent. Chunked values are stored as N+1 records (one manifest
    /// plus N chunks); callers issue one `get` per record, spec.md §6.
    async fn get(&self, partition: u32, key_bytes: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;
}
