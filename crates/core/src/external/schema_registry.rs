//! Schema registry: resolves value schemas by id, spec.md §6.

use async_trait::async_trait;
use std::collections::HashMap;

/// Field kind, just enough to support the compute operators in spec.md §3
/// `ComputeRequest` (dot product, cosine similarity, Hadamard product, count).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    F32Vector,
    I64,
    F64,
    Bytes,
    String,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
}

/// A record schema: an ordered set of named, typed fields.
#[derive(Debug, Clone)]
pub struct ValueSchema {
    pub schema_id: u32,
    pub fields: Vec<FieldSpec>,
}

impl ValueSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn get_value_schema(&self, store: &str, id: u32) -> anyhow::Result<Option<ValueSchema>>;
    async fn get_latest_value_schema(&self, store: &str) -> anyhow::Result<Option<ValueSchema>>;
}

/// An in-memory registry, used by tests and the demo binary.
#[derive(Default)]
pub struct InMemorySchemaRegistry {
    pub schemas: parking_lot::Mutex<HashMap<(String, u32), ValueSchema>>,
}

impl InMemorySchemaRegistry {
    pub fn insert(&self, store: impl Into<String>, schema: ValueSchema) {
        self.schemas.lock().insert((store.into(), schema.schema_id), schema);
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn get_value_schema(&self, store: &str, id: u32) -> anyhow::Result<Option<ValueSchema>> {
        Ok(self.schemas.lock().get(&(store.to_owned(), id)).cloned())
    }

    async fn get_latest_value_schema(&self, store: &str) -> anyhow::Result<Option<ValueSchema>> {
        Ok(self
            .schemas
            .lock()
            .iter()
            .filter(|((s, _), _)| s == store)
            .max_by_key(|((_, id), _)| *id)
            .map(|(_, schema)| schema.clone()))
    }
}
