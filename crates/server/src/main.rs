//! Demo process: wires the admin consumer and read dispatcher to
//! single-process collaborator implementations (`LocalLogTransport`,
//! `SledCoordinationStore`, an in-memory storage engine). A real deployment
//! supplies its own implementations of the traits in `vkv_core::external`
//! for each of these, per spec.md §1/§6.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use parking_lot::Mutex;
use tracing::info;

use vkv_core::admin::leadership::LeadershipGate;
use vkv_core::admin::local_coordination::SledCoordinationStore;
use vkv_core::admin::local_transport::LocalLogTransport;
use vkv_core::admin::operation::AdminOperation;
use vkv_core::admin::{AdminConsumer, AdminConsumerConfig};
use vkv_core::config::ConfigFile;
use vkv_core::context::ClusterId;
use vkv_core::external::coordination::CoordinationStore;
use vkv_core::external::disk_health::HealthStatus;
use vkv_core::external::metadata::CompressionStrategy;
use vkv_core::external::schema_registry::InMemorySchemaRegistry;
use vkv_core::external::{AdminHandler, DiskHealth, LeaderElection, MetadataRetriever, StorageEngine};
use vkv_core::metrics::Metrics;
use vkv_core::read::partition::PartitionResolver;
use vkv_core::read::worker_pool::WorkerPool;
use vkv_core::read::{ReadDispatcher, ReadDispatcherConfig};
use vkv_core::startup::{configure_tracing, TracingOptions};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a TOML config file; falls back to defaults if absent.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory for rolling daily log files, in addition to stdout.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Where the demo's coordination-store sled database lives.
    #[arg(long, default_value = "vkv-data")]
    data_dir: PathBuf,
}

/// Logs every applied operation instead of mutating real cluster metadata.
struct LoggingAdminHandler;

#[async_trait]
impl AdminHandler for LoggingAdminHandler {
    async fn apply(&self, store: &vkv_core::context::StoreName, op: &AdminOperation) -> anyhow::Result<()> {
        info!(store = %store, op = op.operation_type(), execution_id = op.execution_id(), "applied admin operation");
        Ok(())
    }
}

/// A single process is always both leader and top-level controller.
struct SingleNodeElection;

#[async_trait]
impl LeaderElection for SingleNodeElection {
    async fn is_leader(&self, _cluster: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
    async fn is_top_level_controller(&self, _cluster: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

struct AlwaysHealthy;

impl DiskHealth for AlwaysHealthy {
    fn status(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

/// Storage versions created by this demo are never chunked or compressed.
struct StaticMetadata;

#[async_trait]
impl MetadataRetriever for StaticMetadata {
    async fn is_store_version_chunked(&self, _topic: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
    async fn compression_strategy(&self, _topic: &str) -> anyhow::Result<CompressionStrategy> {
        Ok(CompressionStrategy::None)
    }
    async fn compression_dictionary(&self, _topic: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn offset(&self, _topic: &str, _partition: u32) -> anyhow::Result<u64> {
        Ok(0)
    }
}

#[derive(Default)]
struct InMemoryStorageEngine {
    records: Mutex<HashMap<(u32, Vec<u8>), Vec<u8>>>,
}

#[async_trait]
impl StorageEngine for InMemoryStorageEngine {
    async fn get(&self, partition: u32, key_bytes: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.records.lock().get(&(partition, key_bytes.to_vec())).cloned())
    }
}

fn decode_operation(bytes: &[u8], _schema_id: u32) -> Result<AdminOperation, anyhow::Error> {
    Ok(serde_json::from_slice(bytes)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let conf = ConfigFile::load_or_default(&args.config)?;

    configure_tracing(TracingOptions {
        config: conf.logs.clone(),
        disk_logging: args.log_dir.clone(),
    });

    let metrics = Arc::new(Metrics::new());

    std::fs::create_dir_all(&args.data_dir)?;
    let sled_db = sled::open(args.data_dir.join("coordination"))?;
    let coordination: Arc<dyn CoordinationStore> = Arc::new(SledCoordinationStore::open(&sled_db)?);

    let transport = Arc::new(LocalLogTransport::new());
    let leadership = LeadershipGate::new(Arc::new(SingleNodeElection));

    let admin_config = AdminConsumerConfig {
        cluster: ClusterId::new(conf.cluster.id.clone()),
        admin_topic: conf.cluster.admin_topic.clone(),
        admin_partition: 0,
        topic_replication_factor: conf.admin.topic_replication_factor,
        cycle_delay: Duration::from_millis(conf.admin.cycle_delay_ms),
        cycle_timeout: Duration::from_millis(conf.admin.cycle_timeout_ms),
        max_workers: conf.admin.max_workers,
    };

    let mut consumer = AdminConsumer::new(
        admin_config,
        transport,
        coordination,
        Arc::new(LoggingAdminHandler),
        leadership,
        metrics.clone(),
        decode_operation,
    )
    .await?;

    let admin_task = tokio::spawn(async move {
        consumer.run().await;
    });

    // A real deployment hangs a network listener off this dispatcher; wiring
    // that transport is out of scope here (spec.md §1 Non-goals), so it just
    // sits ready to serve once one is attached.
    let storage: Arc<dyn StorageEngine> = Arc::new(InMemoryStorageEngine::default());
    let partitions = Arc::new(PartitionResolver::new());
    let _dispatcher = Arc::new(ReadDispatcher::new(
        storage,
        Arc::new(StaticMetadata),
        Arc::new(InMemorySchemaRegistry::default()),
        Arc::new(AlwaysHealthy),
        partitions,
        WorkerPool::new(conf.read.get_pool_size, metrics.read_queue_depth.with_label_values(&["get"])),
        WorkerPool::new(conf.read.compute_pool_size, metrics.read_queue_depth.with_label_values(&["compute"])),
        vkv_core::read::build_pool(conf.read.compute_pool_size, conf.read.prototype_cache_capacity),
        ReadDispatcherConfig { parallel_chunk_size: conf.read.parallel_chunk_size },
        metrics,
    ));

    info!("vkv-server started");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    admin_task.abort();
    Ok(())
}
