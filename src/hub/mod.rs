//! Real-time event distribution
//!
//! Two broadcast scopes share one delivery mechanism:
//!
//! ```text
//!                        Arc<RealtimeHub>
//!              ┌──────────────────────────────────┐
//!              │ connections: every observer      │ ◄── broadcast_global()
//!              │ subscriptions: camera → observers│ ◄── subscriptions().broadcast()
//!              └────────────────┬─────────────────┘
//!                               │ try_send(Bytes)
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!         Outbox             Outbox             Outbox
//!       (ws writer)        (ws writer)        (ws writer)
//! ```
//!
//! The global scope holds every dashboard observer for its lifetime; the
//! per-camera scope holds only observers that asked for a camera's stream.

pub mod broadcast;
pub mod connection;
pub mod event;
pub mod subscriptions;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

pub use broadcast::{broadcast, broadcast_frame, DeliveryReport};
pub use connection::{Connection, ConnectionId, Outbound, Outbox, SendFailure};
pub use event::{ClientMessage, GlobalEvent, StreamEvent, StreamEventKind, StreamRef};
pub use subscriptions::{SubscriptionGuard, SubscriptionRegistry};

/// Default per-connection outbound queue size
pub const DEFAULT_OBSERVER_BUFFER: usize = 64;

/// Registry of observer connections for both broadcast scopes
#[derive(Debug)]
pub struct RealtimeHub {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    subscriptions: Arc<SubscriptionRegistry>,
    observer_buffer: usize,
    total_connections: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_OBSERVER_BUFFER)
    }

    /// Create a hub whose connections queue at most `observer_buffer` frames
    pub fn with_buffer(observer_buffer: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            observer_buffer,
            total_connections: AtomicU64::new(0),
        }
    }

    /// Per-camera scope, shared with the stream supervisor
    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// Register a new observer in the global scope
    pub async fn register(&self) -> (Connection, Outbox) {
        let (conn, outbox) = Connection::new(self.observer_buffer);

        self.connections.write().await.insert(conn.id(), conn.clone());
        self.total_connections.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %conn.id(), "Observer connected");

        (conn, outbox)
    }

    /// Remove an observer from both scopes
    pub async fn unregister(&self, id: &ConnectionId) {
        let removed = self.connections.write().await.remove(id).is_some();
        let subscriptions = self.subscriptions.remove_connection(id).await;

        if removed {
            tracing::info!(connection_id = %id, subscriptions = subscriptions, "Observer disconnected");
        }
    }

    /// Deliver an entity event to every observer
    pub async fn broadcast_global(&self, event: &GlobalEvent) -> DeliveryReport {
        let connections = self.connections.read().await;
        let report = broadcast(event, connections.values());

        tracing::debug!(
            message_type = event.event_type(),
            delivered = report.delivered,
            skipped = report.skipped,
            "Global event broadcast"
        );
        report
    }

    /// Observers currently connected
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Observers ever connected
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
