//! The coordination store: a hierarchical key-value store with atomic
//! single-key put, spec.md §6 "Coordination store (out)".

use async_trait::async_trait;
use std::collections::HashMap;

/// Durable progress state persisted to the coordination store at cycle end,
/// spec.md §3 "Progress state".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedProgress {
    pub last_succeeded_execution_id: Option<i64>,
    pub last_succeeded_execution_id_by_store: HashMap<String, i64>,
    pub last_persisted_offset: Option<u64>,
}

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Reads the three documented keys for `cluster` in one call. Returns
    /// defaults (all `None`/empty) if nothing has been persisted yet.
    async fn read_progress(&self, cluster: &str) -> anyhow::Result<PersistedProgress>;

    /// Atomically writes `lastSucceededExecutionId` and `offset` for
    /// `cluster`. Called only when the whole cycle succeeded, spec.md §4.D.
    async fn write_progress(
        &self,
        cluster: &str,
        last_succeeded_execution_id: i64,
        offset: u64,
        last_succeeded_execution_id_by_store: &HashMap<String, i64>,
    ) -> anyhow::Result<()>;
}
