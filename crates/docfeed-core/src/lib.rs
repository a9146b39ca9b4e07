//! docfeed core - document store and change feeds.
//!
//! This crate provides the storage engine behind the docfeed gateway: a
//! sled-backed document collection store whose mutations can be followed
//! through blocking, pull-based change feeds.

pub mod document;
pub mod error;
pub mod storage;

pub use document::{ChangeEvent, Document, WriteResult};
pub use error::{Error, Result};
pub use storage::{ChangeFeed, ChangeRecord, ChangeStream, DocumentStore, Next, StorageConfig};
