//! Document store wrapping sled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sled::{Db, Tree};
use tracing::{debug, info};

use super::changelog::{self, ChangeRecord};
use super::feed::{ChangeFeed, FeedRegistry};
use super::StorageConfig;
use crate::document::{Document, WriteResult};
use crate::error::{Error, Result};

/// Tree name prefix for document data.
const DOCS_PREFIX: &str = "docs:";

/// Tree name prefix for change logs.
const CHANGES_PREFIX: &str = "changes:";

/// The trees backing one collection and its open change feeds.
#[derive(Clone)]
struct Collection {
    docs: Tree,
    changes: Tree,
    next_seq: Arc<AtomicU64>,
    feeds: Arc<FeedRegistry>,
}

/// A sled-backed document store with per-collection change logs.
///
/// One store is shared by every request; writes are serialized so that change
/// log order equals commit order.
pub struct DocumentStore {
    db: Db,
    config: StorageConfig,
    collections: RwLock<HashMap<String, Collection>>,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self> {
        let db = config.to_sled_config().open()?;

        let mut collections = HashMap::new();
        for tree_name in db.tree_names() {
            let Ok(tree_name) = std::str::from_utf8(&tree_name) else {
                continue;
            };
            if let Some(name) = tree_name.strip_prefix(DOCS_PREFIX) {
                collections.insert(name.to_string(), Self::open_trees(&db, name)?);
            }
        }

        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            collections = collections.len(),
            "document store opened"
        );

        Ok(Self {
            db,
            config,
            collections: RwLock::new(collections),
            write_lock: Mutex::new(()),
        })
    }

    fn open_trees(db: &Db, name: &str) -> Result<Collection> {
        let changes = db.open_tree(format!("{}{}", CHANGES_PREFIX, name))?;
        let next_seq = changelog::next_seq(&changes)?;
        Ok(Collection {
            docs: db.open_tree(format!("{}{}", DOCS_PREFIX, name))?,
            changes,
            next_seq: Arc::new(AtomicU64::new(next_seq)),
            feeds: Arc::new(FeedRegistry::default()),
        })
    }

    /// Create a collection if it does not exist yet.
    pub fn create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write();
        if !collections.contains_key(name) {
            collections.insert(name.to_string(), Self::open_trees(&self.db, name)?);
            info!(collection = name, "collection created");
        }
        Ok(())
    }

    /// Names of all collections, sorted.
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn collection(&self, name: &str) -> Result<Collection> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }

    /// Get one document by primary key.
    pub fn get(&self, collection: &str, name: &str) -> Result<Document> {
        let coll = self.collection(collection)?;
        match coll.docs.get(name.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Get every document in a collection, ordered by primary key.
    pub fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let coll = self.collection(collection)?;
        coll.docs
            .iter()
            .values()
            .map(|value| -> Result<Document> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }

    /// Insert a new document. Fails if the primary key is taken.
    pub fn insert(&self, collection: &str, doc: Document) -> Result<WriteResult> {
        doc.validate()?;
        let coll = self.collection(collection)?;

        let _guard = self.write_lock.lock();
        if coll.docs.contains_key(doc.name.as_bytes())? {
            return Err(Error::Duplicate(doc.name));
        }
        coll.docs.insert(doc.name.as_bytes(), serde_json::to_vec(&doc)?)?;
        self.record(collection, &coll, &ChangeRecord::insert(doc))?;

        Ok(WriteResult {
            inserted: 1,
            ..Default::default()
        })
    }

    /// Merge `patch` into the document whose primary key is `patch.name`.
    ///
    /// A missing document, or a patch without a name, is skipped rather than
    /// treated as an error.
    pub fn update(&self, collection: &str, patch: &Document) -> Result<WriteResult> {
        let coll = self.collection(collection)?;
        let name = patch.name.as_str();

        let _guard = self.write_lock.lock();
        let Some(bytes) = coll.docs.get(name.as_bytes())? else {
            debug!(collection, name, "update skipped, document missing");
            return Ok(WriteResult {
                skipped: 1,
                ..Default::default()
            });
        };

        let old: Document = serde_json::from_slice(&bytes)?;
        let mut new = old.clone();
        if !new.merge(patch) {
            return Ok(WriteResult {
                unchanged: 1,
                ..Default::default()
            });
        }

        coll.docs.insert(name.as_bytes(), serde_json::to_vec(&new)?)?;
        self.record(collection, &coll, &ChangeRecord::update(old, new))?;

        Ok(WriteResult {
            replaced: 1,
            ..Default::default()
        })
    }

    /// Delete the document stored under `name`, if any.
    pub fn delete(&self, collection: &str, name: &str) -> Result<WriteResult> {
        let coll = self.collection(collection)?;

        let _guard = self.write_lock.lock();
        let Some(bytes) = coll.docs.remove(name.as_bytes())? else {
            return Ok(WriteResult {
                skipped: 1,
                ..Default::default()
            });
        };

        let old: Document = serde_json::from_slice(&bytes)?;
        self.record(collection, &coll, &ChangeRecord::delete(old))?;

        Ok(WriteResult {
            deleted: 1,
            ..Default::default()
        })
    }

    /// Subscribe to the changes committed to a collection from now on.
    ///
    /// A feed that falls more than `feed_queue_capacity` records behind is
    /// detached and reports a stream error; writers never wait for it.
    pub fn changes(&self, collection: &str) -> Result<ChangeFeed> {
        let coll = self.collection(collection)?;
        Ok(coll.feeds.subscribe(
            collection,
            self.config.feed_queue_capacity,
            self.config.poll_interval,
        ))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Append to the change log and notify open feeds. Caller holds `write_lock`.
    fn record(&self, collection: &str, coll: &Collection, record: &ChangeRecord) -> Result<()> {
        let seq = coll.next_seq.fetch_add(1, Ordering::Relaxed);
        changelog::append(&coll.changes, seq, record, self.config.changelog_retention)?;
        coll.feeds.publish(collection, record);
        Ok(())
    }
}

impl Drop for DocumentStore {
    fn drop(&mut self) {
        for coll in self.collections.read().values() {
            coll.feeds.detach_all();
        }
    }
}
