//! `AdminOperation` as a sum type, per the REDESIGN FLAG in spec.md §9: the
//! original reflective "look up a `storeName` field by name on a record of
//! unknown schema" is replaced by a typed enum whose every variant either
//! owns a `store_name` field directly, or (for `KillOfflinePush`) derives it
//! at compile-checked parse time from an embedded topic name.

use serde::{Deserialize, Serialize};

use crate::context::{StorageVersionId, StoreName};
use crate::error::DispatchError;

/// A strictly monotonic, cluster-wide identifier assigned by the producer.
pub type ExecutionId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operationType")]
pub enum AdminOperation {
    CreateStore {
        execution_id: ExecutionId,
        store_name: String,
        replication_factor: u32,
    },
    AddSchema {
        execution_id: ExecutionId,
        store_name: String,
        schema_id: u32,
        schema_bytes: Vec<u8>,
    },
    VersionBump {
        execution_id: ExecutionId,
        store_name: String,
        new_version: u32,
    },
    /// The one exempt tag: no explicit `storeName` field. The store name is
    /// parsed out of the log-topic name, which is of the form `<store>_v<n>`.
    KillOfflinePush {
        execution_id: ExecutionId,
        topic: String,
    },
    /// Catch-all for admin operation kinds this core does not special-case;
    /// still required to carry a `storeName`, per spec.md §3's derivation
    /// rule for non-exempt tags. The business semantics of these operations
    /// are explicitly out of scope (spec.md §1 Non-goals).
    Other {
        execution_id: ExecutionId,
        store_name: String,
        operation_type: String,
        payload: Vec<u8>,
    },
}

impl AdminOperation {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::CreateStore { execution_id, .. }
            | Self::AddSchema { execution_id, .. }
            | Self::VersionBump { execution_id, .. }
            | Self::KillOfflinePush { execution_id, .. }
            | Self::Other { execution_id, .. } => *execution_id,
        }
    }

    /// Derives the store name per spec.md §3's rule, at the offset this
    /// operation was read from (used only for error context).
    pub fn store_name(&self, offset: u64) -> Result<StoreName, DispatchError> {
        match self {
            Self::CreateStore { store_name, .. }
            | Self::AddSchema { store_name, .. }
            | Self::VersionBump { store_name, .. }
            | Self::Other { store_name, .. } => {
                if store_name.is_empty() {
                    Err(DispatchError::MissingStoreName { offset })
                } else {
                    Ok(StoreName::new(store_name.clone()))
                }
            }
            Self::KillOfflinePush { topic, .. } => StorageVersionId::parse(topic)
                .map(|id| id.store)
                .ok_or(DispatchError::MissingStoreName { offset }),
        }
    }

    pub fn operation_type(&self) -> &str {
        match self {
            Self::CreateStore { .. } => "CREATE_STORE",
            Self::AddSchema { .. } => "ADD_SCHEMA",
            Self::VersionBump { .. } => "VERSION_BUMP",
            Self::KillOfflinePush { .. } => "KILL_OFFLINE_PUSH",
            Self::Other { operation_type, .. } => operation_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_offline_push_derives_store_from_topic() {
        let op = AdminOperation::KillOfflinePush {
            execution_id: 1,
            topic: "my_store_v4".to_owned(),
        };
        assert_eq!(op.store_name(10).unwrap().as_str(), "my_store");
    }

    #[test]
    fn kill_offline_push_rejects_malformed_topic() {
        let op = AdminOperation::KillOfflinePush {
            execution_id: 1,
            topic: "malformed".to_owned(),
        };
        assert!(op.store_name(10).is_err());
    }

    #[test]
    fn other_rejects_empty_store_name() {
        let op = AdminOperation::Other {
            execution_id: 1,
            store_name: String::new(),
            operation_type: "SOME_NEW_TAG".to_owned(),
            payload: vec![],
        };
        assert!(op.store_name(5).is_err());
    }
}
