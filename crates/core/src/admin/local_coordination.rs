//! A `sled`-backed `CoordinationStore`, grounded on the teacher's
//! tree-per-key `control_db` pattern: each of the three documented keys
//! (spec.md §6) is a fixed key in a dedicated sled tree, read and written
//! with `serde_json`. Good enough for a single-process demo; a production
//! deployment's real coordination store is external per spec.md §1.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::external::coordination::{CoordinationStore, PersistedProgress};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredProgress {
    last_succeeded_execution_id: Option<i64>,
    last_succeeded_execution_id_by_store: HashMap<String, i64>,
    last_persisted_offset: Option<u64>,
}

pub struct SledCoordinationStore {
    tree: sled::Tree,
}

impl SledCoordinationStore {
    pub fn open(db: &sled::Db) -> anyhow::Result<Self> {
        Ok(Self {
            tree: db.open_tree("admin_progress")?,
        })
    }

    fn key(cluster: &str) -> Vec<u8> {
        format!("progress/{cluster}").into_bytes()
    }
}

#[async_trait]
impl CoordinationStore for SledCoordinationStore {
    async fn read_progress(&self, cluster: &str) -> anyhow::Result<PersistedProgress> {
        let Some(bytes) = self.tree.get(Self::key(cluster))? else {
            return Ok(PersistedProgress::default());
        };
        let stored: StoredProgress = serde_json::from_slice(&bytes)?;
        Ok(PersistedProgress {
            last_succeeded_execution_id: stored.last_succeeded_execution_id,
            last_succeeded_execution_id_by_store: stored.last_succeeded_execution_id_by_store,
            last_persisted_offset: stored.last_persisted_offset,
        })
    }

    async fn write_progress(
        &self,
        cluster: &str,
        last_succeeded_execution_id: i64,
        offset: u64,
        last_succeeded_execution_id_by_store: &HashMap<String, i64>,
    ) -> anyhow::Result<()> {
        let stored = StoredProgress {
            last_succeeded_execution_id: Some(last_succeeded_execution_id),
            last_succeeded_execution_id_by_store: last_succeeded_execution_id_by_store.clone(),
            last_persisted_offset: Some(offset),
        };
        let bytes = serde_json::to_vec(&stored)?;
        self.tree.insert(Self::key(cluster), bytes)?;
        self.tree.flush_async().await?;
        Ok(())
    }
}

/// An in-memory `CoordinationStore`, used by tests that don't need
/// durability across process restarts.
#[derive(Default)]
pub struct InMemoryCoordinationStore {
    state: parking_lot::Mutex<HashMap<String, PersistedProgress>>,
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn read_progress(&self, cluster: &str) -> anyhow::Result<PersistedProgress> {
        Ok(self.state.lock().get(cluster).cloned().unwrap_or_default())
    }

    async fn write_progress(
        &self,
        cluster: &str,
        last_succeeded_execution_id: i64,
        offset: u64,
        last_succeeded_execution_id_by_store: &HashMap<String, i64>,
    ) -> anyhow::Result<()> {
        self.state.lock().insert(
            cluster.to_owned(),
            PersistedProgress {
                last_succeeded_execution_id: Some(last_succeeded_execution_id),
                last_succeeded_execution_id_by_store: last_succeeded_execution_id_by_store.clone(),
                last_persisted_offset: Some(offset),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sled_store_round_trips_progress() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = SledCoordinationStore::open(&db).unwrap();

        let empty = store.read_progress("c1").await.unwrap();
        assert_eq!(empty, PersistedProgress::default());

        store
            .write_progress("c1", 109, 19, &HashMap::from([("store-a".to_owned(), 109)]))
            .await
            .unwrap();
        let read = store.read_progress("c1").await.unwrap();
        assert_eq!(read.last_succeeded_execution_id, Some(109));
        assert_eq!(read.last_persisted_offset, Some(19));
    }
}
