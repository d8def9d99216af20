//! Trait boundaries for every collaborator spec.md §1/§6 declares out of
//! scope. This core depends only on these traits; concrete backings (a real
//! log transport, a real coordination store, ...) are supplied by the
//! embedding service. A `local` implementation of each, good enough for
//! tests and a single-process demo, lives alongside the trait.

pub mod admin_handler;
pub mod coordination;
pub mod disk_health;
pub mod leader_election;
pub mod log_transport;
pub mod metadata;
pub mod schema_registry;
pub mod storage_engine;

pub use admin_handler::AdminHandler;
pub use coordination::CoordinationStore;
pub use disk_health::{DiskHealth, HealthStatus};
pub use leader_election::LeaderElection;
pub use log_transport::{AdminLogTransport, LogEnvelope, LogKey, LogRecord};
pub use metadata::MetadataRetriever;
pub use schema_registry::SchemaRegistry;
pub use storage_engine::StorageEngine;
