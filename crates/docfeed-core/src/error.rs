//! Core error types.

use thiserror::Error;

/// Document store and change feed errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// The requested collection does not exist in the store.
    #[error("collection `{0}` does not exist")]
    UnknownCollection(String),

    /// Document not found.
    #[error("document `{0}` not found")]
    NotFound(String),

    /// A document with the same primary key already exists.
    #[error("duplicate primary key `{0}`")]
    Duplicate(String),

    /// A required field is missing or empty.
    #[error("must field: {0}")]
    Validation(&'static str),

    /// Serialization or deserialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data does not have the expected layout.
    #[error("corrupted {0}")]
    Corrupted(String),

    /// The change stream failed mid-iteration.
    #[error("change stream error: {0}")]
    Stream(String),

    /// The subscription was already closed.
    #[error("subscription closed")]
    Closed,
}

impl Error {
    /// Whether this error means the store or subscription could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::UnknownCollection(_))
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
