//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use docfeed_core::StorageConfig;

/// docfeed HTTP gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "docfeed-gateway")]
#[command(about = "HTTP CRUD and change feed gateway for docfeed")]
#[command(version)]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    pub listen: String,

    /// Directory holding the document store.
    #[arg(short, long, default_value = "./docfeed-data")]
    pub data_dir: PathBuf,

    /// Collection served by the CRUD endpoints.
    #[arg(short, long, default_value = "mydoc")]
    pub collection: String,

    /// Use a temporary store that is discarded on exit.
    #[arg(long, default_value_t = false)]
    pub temporary: bool,

    /// Page cache capacity of the store in bytes.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pub cache_capacity_bytes: u64,

    /// Change records kept per collection.
    #[arg(long, default_value_t = docfeed_core::storage::DEFAULT_CHANGELOG_RETENTION)]
    pub changelog_retention: usize,

    /// Longest a change feed producer blocks (ms) before checking for disconnect.
    #[arg(long, default_value_t = 250)]
    pub poll_interval_ms: u64,

    /// Undelivered changes a stream may fall behind before it is ended.
    #[arg(long, default_value_t = docfeed_core::storage::DEFAULT_FEED_QUEUE_CAPACITY)]
    pub feed_queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Directory holding the document store.
    pub data_dir: PathBuf,
    /// Collection served by the CRUD endpoints.
    pub collection: String,
    /// Use a temporary store.
    pub temporary: bool,
    /// Page cache capacity in bytes.
    pub cache_capacity: u64,
    /// Change records kept per collection.
    pub changelog_retention: usize,
    /// Change feed poll interval.
    pub poll_interval: Duration,
    /// Undelivered changes a stream may fall behind.
    pub feed_queue_capacity: usize,
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            data_dir: args.data_dir.clone(),
            collection: args.collection.clone(),
            temporary: args.temporary,
            cache_capacity: args.cache_capacity_bytes,
            changelog_retention: args.changelog_retention,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            feed_queue_capacity: args.feed_queue_capacity,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./docfeed-data"),
            collection: "mydoc".to_string(),
            temporary: false,
            cache_capacity: 64 * 1024 * 1024,
            changelog_retention: docfeed_core::storage::DEFAULT_CHANGELOG_RETENTION,
            poll_interval: docfeed_core::storage::DEFAULT_POLL_INTERVAL,
            feed_queue_capacity: docfeed_core::storage::DEFAULT_FEED_QUEUE_CAPACITY,
        }
    }
}

impl GatewayConfig {
    /// Storage configuration derived from the gateway settings.
    pub fn storage_config(&self) -> StorageConfig {
        let base = if self.temporary {
            StorageConfig::temporary()
        } else {
            StorageConfig::new(&self.data_dir)
        };

        base.with_cache_capacity(self.cache_capacity)
            .with_changelog_retention(self.changelog_retention)
            .with_poll_interval(self.poll_interval)
            .with_feed_queue_capacity(self.feed_queue_capacity)
    }
}
