//! Document model and change events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A document in a collection, keyed by `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key.
    #[serde(default)]
    pub name: String,
    /// Optional age.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    /// Optional timestamp, RFC 3339 on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a document with only a primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the age.
    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    /// Check that the document can be inserted.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation("name"));
        }
        Ok(())
    }

    /// Overwrite fields present in `patch`. The primary key is never changed.
    ///
    /// Returns true if any stored field changed.
    pub fn merge(&mut self, patch: &Document) -> bool {
        let before = self.clone();
        if patch.age.is_some() {
            self.age = patch.age;
        }
        if patch.time.is_some() {
            self.time = patch.time;
        }
        *self != before
    }
}

/// A before/after pair for one mutation of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Value before the mutation; absent for inserts.
    pub previous_value: Option<Document>,
    /// Value after the mutation; absent for deletes.
    pub new_value: Option<Document>,
}

impl ChangeEvent {
    /// Consume the event, keeping only the post-mutation value.
    pub fn into_new_value(self) -> Option<Document> {
        self.new_value
    }
}

/// Counters describing the outcome of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub inserted: u64,
    pub replaced: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub errors: u64,
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{inserted: {}, replaced: {}, unchanged: {}, skipped: {}, deleted: {}, errors: {}}}",
            self.inserted, self.replaced, self.unchanged, self.skipped, self.deleted, self.errors
        )
    }
}
