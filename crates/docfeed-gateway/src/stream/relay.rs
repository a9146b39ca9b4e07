//! Single-slot hand-off between a change feed producer and a response writer.
//!
//! At most one item is in flight: a producer blocks in `send_blocking` until the
//! consumer has taken the previous item, so a slow client stalls the upstream
//! subscription instead of growing a buffer.

use thiserror::Error;
use tokio::sync::mpsc;

/// The consumer side closed the relay.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("relay closed")]
pub struct RelayClosed;

/// Create a connected sender/receiver pair.
pub fn channel<T>() -> (RelaySender<T>, RelayReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (RelaySender { tx }, RelayReceiver { rx, closed: false })
}

/// Producer half.
pub struct RelaySender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> RelaySender<T> {
    /// Hand over an item, blocking the current thread while the slot is full.
    ///
    /// Must not be called from an async context.
    pub fn send_blocking(&self, item: T) -> Result<(), RelayClosed> {
        self.tx.blocking_send(item).map_err(|_| RelayClosed)
    }

    /// Whether the receiver was closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half.
pub struct RelayReceiver<T> {
    rx: mpsc::Receiver<T>,
    closed: bool,
}

impl<T> RelayReceiver<T> {
    /// Next item, or `None` once the relay is closed or the producer is gone.
    pub async fn recv(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Close the relay. Any undelivered item is discarded. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
