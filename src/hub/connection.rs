//! Observer connection handles
//!
//! A [`Connection`] is the sending half of one observer's outbound queue;
//! the transport task (WebSocket writer) drains the paired [`Outbox`].
//! Handles are cheap to clone and may sit in several scopes at once.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use uuid::Uuid;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// Why a frame was not handed to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Transport is gone
    Closed,
    /// Outbound queue is full; this frame is dropped
    Full,
}

/// Sending side of an observer connection
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
    close: Arc<Notify>,
}

/// Item drained by the transport task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Bytes),
    Close,
}

/// Receiving side of an observer connection
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Bytes>,
    close: Arc<Notify>,
}

impl Connection {
    /// Create a connection with a bounded outbound queue
    pub fn new(capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = Arc::new(Notify::new());

        let conn = Self {
            id: Uuid::new_v4(),
            tx,
            close: Arc::clone(&close),
        };

        (conn, Outbox { rx, close })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting
    pub fn try_send(&self, frame: Bytes) -> Result<(), SendFailure> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Ask the transport to close; takes precedence over queued frames
    pub fn close(&self) {
        self.close.notify_one();
    }

    /// Whether the transport side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the transport side has gone away
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

impl Outbox {
    /// Next item for the transport. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            _ = self.close.notified() => Some(Outbound::Close),
            frame = self.rx.recv() => frame.map(Outbound::Frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_recv() {
        let (conn, mut outbox) = Connection::new(4);

        conn.try_send(Bytes::from_static(b"{}")).unwrap();
        assert_eq!(outbox.recv().await, Some(Outbound::Frame(Bytes::from_static(b"{}"))));
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (conn, _outbox) = Connection::new(1);

        assert_eq!(conn.try_send(Bytes::from_static(b"1")), Ok(()));
        assert_eq!(conn.try_send(Bytes::from_static(b"2")), Err(SendFailure::Full));
    }

    #[tokio::test]
    async fn test_closed_after_outbox_dropped() {
        let (conn, outbox) = Connection::new(4);
        assert!(!conn.is_closed());

        drop(outbox);

        assert!(conn.is_closed());
        assert_eq!(conn.try_send(Bytes::from_static(b"x")), Err(SendFailure::Closed));
        conn.closed().await;
    }

    #[tokio::test]
    async fn test_close_preempts_frames() {
        let (conn, mut outbox) = Connection::new(4);

        conn.try_send(Bytes::from_static(b"queued")).unwrap();
        conn.close();

        assert_eq!(outbox.recv().await, Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let (conn, _outbox) = Connection::new(4);
        let other = conn.clone();

        assert_eq!(conn.id(), other.id());
    }
}
