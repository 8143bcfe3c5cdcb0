//! Per-camera mutual exclusion for start and stop

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// One lock per camera id, created on first use
#[derive(Debug, Default)]
pub struct CameraLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held while a camera's lifecycle operation runs
#[derive(Debug)]
pub struct CameraLease {
    _guard: OwnedMutexGuard<()>,
}

impl CameraLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds `camera_id`
    pub async fn acquire(&self, camera_id: &str) -> CameraLease {
        let lock = self.get_or_create(camera_id).await;
        CameraLease {
            _guard: lock.lock_owned().await,
        }
    }

    async fn get_or_create(&self, camera_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(camera_id) {
            return Arc::clone(lock);
        }

        let mut locks = self.locks.write().await;
        Arc::clone(
            locks
                .entry(camera_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
