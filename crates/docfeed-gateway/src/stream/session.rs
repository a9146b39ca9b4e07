//! One client's change feed stream.
//!
//! ```text
//!   Starting ──open ok──▶ Streaming ──disconnect / feed end / feed error──▶ Closed
//!      │                                                                  ▲
//!      └──────────────────────────open failed─────────────────────────────┘
//! ```
//!
//! While streaming, a blocking producer pulls from the change feed and hands
//! each post-mutation document to the relay; the consumer races the relay
//! against the client disconnect signal and writes one JSON line per event.

use docfeed_core::{ChangeStream, Document, Next};
use tracing::{debug, info, warn};

use super::relay::{self, RelayReceiver, RelaySender};
use super::sink::ResponseSink;

/// Lifecycle state of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Streaming,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection.
    ClientDisconnected,
    /// The change feed ended.
    FeedEnded,
    /// The change feed failed.
    FeedFailed(String),
}

/// Why the producer loop stopped.
#[derive(Debug)]
enum ProducerExit {
    RelayClosed,
    Ended,
    Failed(String),
}

/// A change feed stream bound to one client request.
pub struct StreamSession<S: ChangeStream> {
    id: u64,
    collection: String,
    state: SessionState,
    feed: Option<S>,
    relay: Option<RelayReceiver<Option<Document>>>,
}

impl<S: ChangeStream> StreamSession<S> {
    /// Open the change feed for `collection`.
    ///
    /// On failure the session goes straight to `Closed` and nothing is written.
    pub fn open<F>(id: u64, collection: &str, open: F) -> docfeed_core::Result<Self>
    where
        F: FnOnce(&str) -> docfeed_core::Result<S>,
    {
        let mut session = Self {
            id,
            collection: collection.to_string(),
            state: SessionState::Starting,
            feed: None,
            relay: None,
        };

        match open(collection) {
            Ok(feed) => {
                session.feed = Some(feed);
                info!(session = id, collection, "stream session opened");
                Ok(session)
            }
            Err(e) => {
                session.close();
                warn!(session = id, collection, error = %e, "stream session failed to open");
                Err(e)
            }
        }
    }

    /// Session identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stream changes into `sink` until the client leaves or the feed stops.
    pub async fn run(mut self, sink: ResponseSink) -> SessionEnd {
        let Some(feed) = self.feed.take() else {
            self.close();
            return SessionEnd::FeedEnded;
        };
        self.state = SessionState::Streaming;

        let (tx, rx) = relay::channel();
        let producer = tokio::task::spawn_blocking(move || produce(feed, tx));
        let rx = self.relay.insert(rx);

        let end = loop {
            tokio::select! {
                biased;
                _ = sink.disconnected() => break None,
                next = rx.recv() => match next {
                    Some(doc) => {
                        let line = match serde_json::to_vec(&doc) {
                            Ok(line) => line,
                            Err(e) => break Some(SessionEnd::FeedFailed(e.to_string())),
                        };
                        if sink.write_line(line).await.is_err() {
                            break None;
                        }
                        debug!(session = self.id, "change written");
                    }
                    None => break Some(SessionEnd::FeedEnded),
                },
            }
        };

        self.close();

        // The producer notices the closed relay within one poll interval.
        let exit = match producer.await {
            Ok(exit) => exit,
            Err(e) => ProducerExit::Failed(format!("producer panicked: {}", e)),
        };

        let end = match (end, exit) {
            (None, _) => SessionEnd::ClientDisconnected,
            (Some(SessionEnd::FeedEnded), ProducerExit::Failed(msg)) => SessionEnd::FeedFailed(msg),
            (Some(end), _) => end,
        };

        match &end {
            SessionEnd::FeedFailed(error) => {
                warn!(session = self.id, collection = %self.collection, %error, "stream session failed")
            }
            end => {
                info!(session = self.id, collection = %self.collection, ?end, "stream session closed")
            }
        }
        end
    }

    /// Release the subscription and close the relay. Idempotent.
    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        if let Some(feed) = self.feed.as_mut() {
            feed.close();
        }
        if let Some(relay) = self.relay.as_mut() {
            relay.close();
        }
    }
}

impl<S: ChangeStream> Drop for StreamSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pull changes and forward each post-mutation value until told to stop.
fn produce<S: ChangeStream>(mut feed: S, relay: RelaySender<Option<Document>>) -> ProducerExit {
    let exit = loop {
        if relay.is_closed() {
            break ProducerExit::RelayClosed;
        }
        match feed.next() {
            Ok(Next::Change(event)) => {
                if relay.send_blocking(event.into_new_value()).is_err() {
                    break ProducerExit::RelayClosed;
                }
            }
            Ok(Next::Idle) => {}
            Ok(Next::End) => break ProducerExit::Ended,
            Err(e) => break ProducerExit::Failed(e.to_string()),
        }
    };
    feed.close();
    exit
}
