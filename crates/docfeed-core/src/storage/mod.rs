//! Storage layer for docfeed.
//!
//! Documents live in one sled tree per collection; each collection also has a
//! change log tree. Committed change records are handed to every open change
//! feed of the collection without blocking the writer.

mod changelog;
mod config;
mod engine;
mod feed;

pub use changelog::ChangeRecord;
pub use config::{
    StorageConfig, DEFAULT_CHANGELOG_RETENTION, DEFAULT_FEED_QUEUE_CAPACITY, DEFAULT_POLL_INTERVAL,
};
pub use engine::DocumentStore;
pub use feed::{ChangeFeed, ChangeStream, Next};
