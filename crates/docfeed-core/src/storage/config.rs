//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of change records kept per collection.
pub const DEFAULT_CHANGELOG_RETENTION: usize = 1024;

/// Default number of undelivered records a change feed may queue before it is detached.
pub const DEFAULT_FEED_QUEUE_CAPACITY: usize = 1024;

/// Default upper bound on how long a change feed waits for the next record.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for the document store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Change records kept per collection before the oldest are pruned.
    pub changelog_retention: usize,

    /// Longest a single change feed `next` call blocks before reporting idle.
    pub poll_interval: Duration,

    /// Undelivered records a change feed may queue before it is detached.
    pub feed_queue_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./docfeed-data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            flush_every_ms: Some(1000),
            compression: true,
            temporary: false,
            changelog_retention: DEFAULT_CHANGELOG_RETENTION,
            poll_interval: DEFAULT_POLL_INTERVAL,
            feed_queue_capacity: DEFAULT_FEED_QUEUE_CAPACITY,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the number of change records kept per collection.
    pub fn with_changelog_retention(mut self, records: usize) -> Self {
        self.changelog_retention = records.max(1);
        self
    }

    /// Set the change feed poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many records a lagging change feed may queue.
    pub fn with_feed_queue_capacity(mut self, records: usize) -> Self {
        self.feed_queue_capacity = records.max(1);
        self
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}
