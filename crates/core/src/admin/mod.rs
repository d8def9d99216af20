//! Admin log consumer and per-store dispatcher, spec.md §2 components A-F.

pub mod consumer;
pub mod cursor;
pub mod div;
pub mod dispatcher;
pub mod execution_pool;
pub mod leadership;
pub mod local_coordination;
pub mod local_transport;
pub mod operation;
pub mod progress;

pub use consumer::{AdminConsumer, AdminConsumerConfig};
pub use operation::AdminOperation;
