//! Per-camera subscription registry
//!
//! Maps a camera id to the observer connections interested in its stream
//! events. Membership is dropped when the connection itself closes: every
//! insertion arms a watcher on the connection's close notification, so a
//! dead observer never lingers between two broadcasts. The watcher lives
//! exactly as long as the membership and is aborted when it is removed.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::task::AbortHandle;

use super::broadcast::{broadcast, DeliveryReport};
use super::connection::{Connection, ConnectionId};
use super::event::StreamEvent;

type CameraSets = HashMap<String, HashMap<ConnectionId, Member>>;

/// One (camera, connection) membership
#[derive(Debug)]
struct Member {
    conn: Connection,
    watcher: AbortHandle,
}

impl Drop for Member {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Camera id to subscribed connections
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    cameras: RwLock<CameraSets>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a camera's set
    ///
    /// Returns false if it was already a member.
    pub async fn add(self: &Arc<Self>, camera_id: &str, conn: Connection) -> bool {
        self.lock().await.insert(camera_id, conn)
    }

    /// Exclusive access to every camera's set
    ///
    /// Broadcast target lookups wait until the guard is dropped, so whatever
    /// the holder sends to a new member precedes any later broadcast.
    pub async fn lock(self: &Arc<Self>) -> SubscriptionGuard<'_> {
        SubscriptionGuard {
            registry: self,
            cameras: self.cameras.write().await,
        }
    }

    /// Remove a connection from one camera's set
    pub async fn remove(&self, camera_id: &str, id: &ConnectionId) -> bool {
        let mut cameras = self.cameras.write().await;

        let Some(set) = cameras.get_mut(camera_id) else {
            return false;
        };
        let removed = set.remove(id).is_some();
        if set.is_empty() {
            cameras.remove(camera_id);
        }

        if removed {
            tracing::debug!(camera_id = %camera_id, connection_id = %id, "Subscriber removed");
        }
        removed
    }

    /// Remove a connection from every camera's set
    pub async fn remove_connection(&self, id: &ConnectionId) -> usize {
        let mut cameras = self.cameras.write().await;
        let mut removed = 0;

        cameras.retain(|_, set| {
            if set.remove(id).is_some() {
                removed += 1;
            }
            !set.is_empty()
        });

        removed
    }

    /// Snapshot of a camera's subscribers
    pub async fn targets(&self, camera_id: &str) -> Vec<Connection> {
        self.cameras
            .read()
            .await
            .get(camera_id)
            .map(|set| set.values().map(|m| m.conn.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliver a stream event to its camera's subscribers
    pub async fn broadcast(&self, event: &StreamEvent) -> DeliveryReport {
        let targets = self.targets(&event.camera_id).await;
        let report = broadcast(event, &targets);

        tracing::debug!(
            camera_id = %event.camera_id,
            message_type = event.event_type(),
            delivered = report.delivered,
            skipped = report.skipped,
            "Stream event broadcast"
        );
        report
    }

    /// Drop a camera's entry, returning its former members
    pub async fn take(&self, camera_id: &str) -> Vec<Connection> {
        self.cameras
            .write()
            .await
            .remove(camera_id)
            .map(|set| set.values().map(|m| m.conn.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of subscribers for a camera
    pub async fn subscriber_count(&self, camera_id: &str) -> usize {
        self.cameras
            .read()
            .await
            .get(camera_id)
            .map_or(0, HashMap::len)
    }

    /// Number of (camera, connection) memberships
    pub async fn total(&self) -> usize {
        self.cameras.read().await.values().map(HashMap::len).sum()
    }
}

/// Write access to a [`SubscriptionRegistry`]
pub struct SubscriptionGuard<'a> {
    registry: &'a Arc<SubscriptionRegistry>,
    cameras: RwLockWriteGuard<'a, CameraSets>,
}

impl SubscriptionGuard<'_> {
    /// Add a connection to a camera's set, arming its close watcher
    ///
    /// Returns false if it was already a member.
    pub fn insert(&mut self, camera_id: &str, conn: Connection) -> bool {
        let id = conn.id();
        let set = self.cameras.entry(camera_id.to_string()).or_default();
        if set.contains_key(&id) {
            return false;
        }

        let watcher = {
            let registry: Weak<SubscriptionRegistry> = Arc::downgrade(self.registry);
            let camera_id = camera_id.to_string();
            let watched = conn.clone();
            tokio::spawn(async move {
                watched.closed().await;
                if let Some(registry) = registry.upgrade() {
                    registry.remove(&camera_id, &id).await;
                }
            })
            .abort_handle()
        };

        set.insert(id, Member { conn, watcher });
        tracing::debug!(camera_id = %camera_id, connection_id = %id, "Subscriber added");
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_add_and_targets() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, _a_out) = Connection::new(4);
        let (b, _b_out) = Connection::new(4);

        assert!(registry.add("cam-1", a.clone()).await);
        assert!(registry.add("cam-1", b).await);
        assert!(!registry.add("cam-1", a.clone()).await);
        assert!(registry.add("cam-2", a).await);

        assert_eq!(registry.subscriber_count("cam-1").await, 2);
        assert_eq!(registry.subscriber_count("cam-2").await, 1);
        assert_eq!(registry.subscriber_count("cam-3").await, 0);
        assert_eq!(registry.total().await, 3);
        assert_eq!(registry.targets("cam-1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_close_notification_removes_member() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, a_out) = Connection::new(4);
        let (b, _b_out) = Connection::new(4);

        registry.add("cam-1", a).await;
        registry.add("cam-1", b).await;

        drop(a_out);

        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.subscriber_count("cam-1").await != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("closed connection was not removed");
    }

    #[tokio::test]
    async fn test_remove_connection_everywhere() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, _a_out) = Connection::new(4);

        registry.add("cam-1", a.clone()).await;
        registry.add("cam-2", a.clone()).await;

        assert_eq!(registry.remove_connection(&a.id()).await, 2);
        assert_eq!(registry.total().await, 0);
    }

    #[tokio::test]
    async fn test_take_clears_entry() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, _a_out) = Connection::new(4);

        registry.add("cam-1", a).await;

        assert_eq!(registry.take("cam-1").await.len(), 1);
        assert!(registry.targets("cam-1").await.is_empty());
        assert!(registry.take("cam-1").await.is_empty());
    }

    async fn assert_released(outbox: &mut crate::hub::Outbox) {
        let item = tokio::time::timeout(Duration::from_secs(2), outbox.recv())
            .await
            .expect("a membership still holds the connection");
        assert!(item.is_none());
    }

    #[tokio::test]
    async fn test_remove_releases_watcher() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, mut a_out) = Connection::new(4);

        registry.add("cam-1", a.clone()).await;
        assert!(registry.remove("cam-1", &a.id()).await);
        drop(a);

        assert_released(&mut a_out).await;
    }

    #[tokio::test]
    async fn test_take_and_resubscribe_release_watchers() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, mut a_out) = Connection::new(4);

        for camera_id in ["cam-1", "cam-2", "cam-1"] {
            registry.add(camera_id, a.clone()).await;
            registry.take(camera_id).await;
        }
        registry.add("cam-3", a.clone()).await;
        assert_eq!(registry.remove_connection(&a.id()).await, 1);
        drop(a);

        assert_released(&mut a_out).await;
    }

    #[tokio::test]
    async fn test_broadcast_reaches_camera_only() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, mut a_out) = Connection::new(4);
        let (b, _b_out) = Connection::new(4);

        registry.add("cam-1", a).await;
        registry.add("cam-2", b).await;

        let report = registry
            .broadcast(&StreamEvent::new("cam-1", crate::hub::StreamEventKind::StreamActive))
            .await;
        assert_eq!(report, DeliveryReport { delivered: 1, skipped: 0 });
        assert!(matches!(a_out.recv().await, Some(crate::hub::Outbound::Frame(_))));
    }

    #[tokio::test]
    async fn test_guard_holds_off_lookups() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, _a_out) = Connection::new(4);

        let mut guard = registry.lock().await;
        assert!(guard.insert("cam-1", a.clone()));
        assert!(!guard.insert("cam-1", a));

        let lookup = tokio::time::timeout(Duration::from_millis(50), registry.targets("cam-1")).await;
        assert!(lookup.is_err());

        drop(guard);
        assert_eq!(registry.targets("cam-1").await.len(), 1);
    }
}
