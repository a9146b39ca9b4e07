//! Streaming response body with disconnect detection.
//!
//! Each written line becomes one body frame handed to the server immediately.
//! The server drops the body when the client connection closes, which closes
//! the channel and lets the writer observe the disconnect.

use axum::body::Body;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// One chunk of the response body.
pub type BodyChunk = Result<Bytes, std::io::Error>;

/// The client went away before the write completed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("client disconnected")]
pub struct ClientGone;

/// Writer half of a streaming response.
#[derive(Debug)]
pub struct ResponseSink {
    tx: mpsc::Sender<BodyChunk>,
}

/// Create a sink and the raw receiver feeding the response.
pub fn channel() -> (ResponseSink, mpsc::Receiver<BodyChunk>) {
    let (tx, rx) = mpsc::channel(1);
    (ResponseSink { tx }, rx)
}

/// Create a sink and the axum body it writes into.
pub fn response_channel() -> (ResponseSink, Body) {
    let (sink, rx) = channel();
    (sink, into_body(rx))
}

/// Turn the receiver half into a streaming axum body.
pub fn into_body(rx: mpsc::Receiver<BodyChunk>) -> Body {
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Body::from_stream(stream)
}

impl ResponseSink {
    /// Write `line` followed by a newline as a single frame.
    pub async fn write_line(&self, mut line: Vec<u8>) -> Result<(), ClientGone> {
        line.push(b'\n');
        self.tx
            .send(Ok(Bytes::from(line)))
            .await
            .map_err(|_| ClientGone)
    }

    /// Resolves once the client is gone.
    pub async fn disconnected(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let (sink, mut rx) = channel();
        sink.write_line(b"{\"name\":\"a\"}".to_vec()).await.unwrap();

        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"{\"name\":\"a\"}\n");
    }

    #[tokio::test]
    async fn test_drop_receiver_signals_disconnect() {
        let (sink, rx) = channel();
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), sink.disconnected()).await;
        assert!(pending.is_err(), "client is still connected");

        drop(rx);
        sink.disconnected().await;
        assert_eq!(sink.write_line(b"null".to_vec()).await, Err(ClientGone));
    }
}
