//! Leadership gate (component F), spec.md §4.F.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::external::LeaderElection;

/// Minimum interval between "waiting for top-level controller" log lines,
/// spec.md §4.F: "logging sparsely — at most once per minute".
const WAIT_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct LeadershipGate {
    election: std::sync::Arc<dyn LeaderElection>,
    is_leader: bool,
    last_wait_log: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipTransition {
    None,
    BecameLeader,
    LostLeadership,
}

impl LeadershipGate {
    pub fn new(election: std::sync::Arc<dyn LeaderElection>) -> Self {
        Self {
            election,
            is_leader: false,
            last_wait_log: Mutex::new(None),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Polls the external collaborator and returns the transition, if any.
    pub async fn tick(&mut self, cluster: &str) -> anyhow::Result<LeadershipTransition> {
        let now_leader = self.election.is_leader(cluster).await?;
        let transition = match (self.is_leader, now_leader) {
            (false, true) => LeadershipTransition::BecameLeader,
            (true, false) => LeadershipTransition::LostLeadership,
            _ => LeadershipTransition::None,
        };
        self.is_leader = now_leader;
        Ok(transition)
    }

    /// Whether this process should itself create the admin topic (versus
    /// waiting on someone else to), and whether a "waiting" log line is due
    /// under the once-per-minute rate limit.
    pub async fn should_create_topic(&self, cluster: &str) -> anyhow::Result<TopicCreationRole> {
        if self.election.is_top_level_controller(cluster).await? {
            return Ok(TopicCreationRole::Create);
        }
        let mut last = self.last_wait_log.lock();
        let now = Instant::now();
        let should_log = last.map_or(true, |t| now.duration_since(t) >= WAIT_LOG_INTERVAL);
        if should_log {
            *last = Some(now);
        }
        Ok(TopicCreationRole::Wait { should_log })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCreationRole {
    Create,
    Wait { should_log: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeElection {
        leader: AtomicBool,
        top_level: bool,
    }

    #[async_trait]
    impl LeaderElection for FakeElection {
        async fn is_leader(&self, _cluster: &str) -> anyhow::Result<bool> {
            Ok(self.leader.load(Ordering::Relaxed))
        }
        async fn is_top_level_controller(&self, _cluster: &str) -> anyhow::Result<bool> {
            Ok(self.top_level)
        }
    }

    #[tokio::test]
    async fn detects_transition_to_leader() {
        let election = Arc::new(FakeElection {
            leader: AtomicBool::new(false),
            top_level: true,
        });
        let mut gate = LeadershipGate::new(election.clone());
        assert_eq!(gate.tick("c1").await.unwrap(), LeadershipTransition::None);
        election.leader.store(true, Ordering::Relaxed);
        assert_eq!(gate.tick("c1").await.unwrap(), LeadershipTransition::BecameLeader);
        assert!(gate.is_leader());
    }

    #[tokio::test]
    async fn detects_transition_to_follower() {
        let election = Arc::new(FakeElection {
            leader: AtomicBool::new(true),
            top_level: true,
        });
        let mut gate = LeadershipGate::new(election.clone());
        gate.tick("c1").await.unwrap();
        election.leader.store(false, Ordering::Relaxed);
        assert_eq!(gate.tick("c1").await.unwrap(), LeadershipTransition::LostLeadership);
    }
}
