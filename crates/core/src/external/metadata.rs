//! Metadata retriever: per-store-version facts needed by the read path,
//! spec.md §6 "Metadata retriever (out)".

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStrategy {
    None,
    Dictionary,
}

#[async_trait]
pub trait MetadataRetriever: Send + Sync {
    async fn is_store_version_chunked(&self, topic: &str) -> anyhow::Result<bool>;
    async fn compression_strategy(&self, topic: &str) -> anyhow::Result<CompressionStrategy>;
    async fn compression_dictionary(&self, topic: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn offset(&self, topic: &str, partition: u32) -> anyhow::Result<u64>;
}
