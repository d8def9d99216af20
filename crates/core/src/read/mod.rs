//! Storage read-path execution handler: components G through K, spec.md §4.

pub mod chunk;
pub mod compute;
pub mod dispatcher;
pub mod messages;
pub mod object_cache;
pub mod partition;
pub mod worker_pool;

pub use dispatcher::{ReadDispatcher, ReadDispatcherConfig};
pub use messages::{ReadRequest, ReadResponse, ReadResponseMeta};
pub use object_cache::{build_pool, ObjectCachePool, WorkerObjectCache};
pub use partition::{PartitionResolver, Partitioner, PartitionerConfig};
pub use worker_pool::WorkerPool;
