//! The admin handler: applies a deserialized admin operation to cluster
//! metadata. spec.md §6 "Admin handler (out)": deterministic, idempotent
//! relative to execution id.

use async_trait::async_trait;

use crate::admin::operation::AdminOperation;
use crate::context::StoreName;

#[async_trait]
pub trait AdminHandler: Send + Sync {
    async fn apply(&self, store: &StoreName, op: &AdminOperation) -> anyhow::Result<()>;
}
