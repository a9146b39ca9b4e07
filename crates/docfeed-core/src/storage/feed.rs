//! Change feeds over a collection's committed mutations.
//!
//! Writers hand each committed change record to every open feed of the
//! collection through a bounded queue. Publishing never blocks: a feed whose
//! queue is full is detached, and its reader gets a stream error once the
//! records queued before the overflow are drained.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::changelog::ChangeRecord;
use crate::document::ChangeEvent;
use crate::error::{Error, Result};

/// Outcome of one pull from a change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// A mutation was committed.
    Change(ChangeEvent),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The engine closed the stream.
    End,
}

/// A blocking, pull-based stream of change events.
///
/// `close` must be idempotent and safe to call after `next` failed or ended.
pub trait ChangeStream: Send + 'static {
    /// Block until the next change, the poll interval elapses, or the stream ends.
    fn next(&mut self) -> Result<Next>;

    /// Release the subscription.
    fn close(&mut self);
}

struct FeedSlot {
    tx: SyncSender<ChangeRecord>,
    lagged: Arc<AtomicBool>,
}

/// Open change feeds of one collection.
#[derive(Default)]
pub(crate) struct FeedRegistry {
    feeds: Mutex<HashMap<u64, FeedSlot>>,
    next_id: AtomicU64,
}

impl FeedRegistry {
    /// Register a feed that receives every record published from now on.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        collection: &str,
        capacity: usize,
        poll_interval: Duration,
    ) -> ChangeFeed {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::sync_channel(capacity);
        let lagged = Arc::new(AtomicBool::new(false));
        self.feeds.lock().insert(
            id,
            FeedSlot {
                tx,
                lagged: lagged.clone(),
            },
        );

        debug!(collection, feed_id = id, "change feed opened");
        ChangeFeed {
            collection: collection.to_string(),
            id,
            registry: Arc::clone(self),
            rx: Some(rx),
            lagged,
            capacity,
            poll_interval,
        }
    }

    /// Queue `record` on every open feed. Full feeds are detached.
    pub(crate) fn publish(&self, collection: &str, record: &ChangeRecord) {
        self.feeds
            .lock()
            .retain(|&id, slot| match slot.tx.try_send(record.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    slot.lagged.store(true, Ordering::SeqCst);
                    warn!(collection, feed_id = id, "change feed fell behind, detaching");
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Detach every feed; readers see the end of the stream.
    pub(crate) fn detach_all(&self) {
        self.feeds.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.feeds.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.feeds.lock().remove(&id);
    }
}

/// Subscription to one collection's committed changes.
pub struct ChangeFeed {
    collection: String,
    id: u64,
    registry: Arc<FeedRegistry>,
    rx: Option<Receiver<ChangeRecord>>,
    lagged: Arc<AtomicBool>,
    capacity: usize,
    poll_interval: Duration,
}

impl ChangeFeed {
    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }
}

impl ChangeStream for ChangeFeed {
    fn next(&mut self) -> Result<Next> {
        let rx = self.rx.as_ref().ok_or(Error::Closed)?;

        match rx.recv_timeout(self.poll_interval) {
            Ok(record) => Ok(Next::Change(record.into())),
            Err(RecvTimeoutError::Timeout) => Ok(Next::Idle),
            Err(RecvTimeoutError::Disconnected) if self.lagged.load(Ordering::SeqCst) => {
                Err(Error::Stream(format!(
                    "change feed on `{}` fell more than {} records behind",
                    self.collection, self.capacity
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Ok(Next::End),
        }
    }

    fn close(&mut self) {
        if self.rx.take().is_some() {
            self.registry.unsubscribe(self.id);
            debug!(collection = %self.collection, feed_id = self.id, "change feed closed");
        }
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("collection", &self.collection)
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
