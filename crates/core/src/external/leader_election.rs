//! Ephemeral leader election, spec.md §4.F "Leadership gate" / §6.

use async_trait::async_trait;

#[async_trait]
pub trait LeaderElection: Send + Sync {
    /// Whether this process currently holds leadership for `cluster`.
    async fn is_leader(&self, cluster: &str) -> anyhow::Result<bool>;

    /// Whether this process is the top-level controller responsible for
    /// creating the admin topic, versus a follower that only waits for it.
    async fn is_top_level_controller(&self, cluster: &str) -> anyhow::Result<bool>;
}
