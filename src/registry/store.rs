//! Stream registry implementation
//!
//! The authoritative map from camera id to its in-flight or active session.
//! Only live sessions are stored; an absent camera reads as `inactive`.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::RwLock;

use super::entry::{StreamSession, StreamStatus};
use crate::stats::SessionStats;
use crate::worker::TranscodeWorker;

/// Central registry for all live stream sessions
///
/// Thread-safe via `RwLock`. Status reads vastly outnumber lifecycle writes.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    sessions: RwLock<HashMap<String, StreamSession>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new session
    ///
    /// Returns the displaced session, if any. The supervisor stops a camera's
    /// previous session before inserting, so a displacement indicates a bug.
    pub async fn insert(&self, session: StreamSession) -> Option<StreamSession> {
        let camera_id = session.camera_id.clone();
        let session_id = session.session_id;

        let previous = self.sessions.write().await.insert(camera_id.clone(), session);

        if let Some(ref prev) = previous {
            tracing::error!(
                camera_id = %camera_id,
                previous_session = prev.session_id,
                session_id = session_id,
                "Session displaced without stop"
            );
        } else {
            tracing::debug!(camera_id = %camera_id, session_id = session_id, "Session registered");
        }

        previous
    }

    /// Current status, `Inactive` if no session exists
    pub async fn status(&self, camera_id: &str) -> StreamStatus {
        self.sessions
            .read()
            .await
            .get(camera_id)
            .map_or(StreamStatus::Inactive, StreamSession::status)
    }

    /// Status of generation `session_id`, `None` once it is no longer registered
    pub async fn generation_status(&self, camera_id: &str, session_id: u64) -> Option<StreamStatus> {
        self.sessions
            .read()
            .await
            .get(camera_id)
            .filter(|s| s.session_id == session_id)
            .map(StreamSession::status)
    }

    /// Session generation currently registered for a camera
    pub async fn session_id(&self, camera_id: &str) -> Option<u64> {
        self.sessions
            .read()
            .await
            .get(camera_id)
            .map(|s| s.session_id)
    }

    pub async fn contains(&self, camera_id: &str) -> bool {
        self.sessions.read().await.contains_key(camera_id)
    }

    /// Mark a session active if it is still the registered generation
    pub async fn activate(&self, camera_id: &str, session_id: u64) -> bool {
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(camera_id) {
            Some(session) if session.session_id == session_id => session.activate(),
            _ => false,
        }
    }

    /// Remove a session unconditionally, moving it to `status`
    ///
    /// Returns the session's worker so the caller can tear it down outside
    /// the registry lock.
    pub async fn remove(
        &self,
        camera_id: &str,
        status: StreamStatus,
    ) -> Option<(StreamSession, Option<TranscodeWorker>)> {
        let mut session = self.sessions.write().await.remove(camera_id)?;
        let worker = session.finish(status);
        Some((session, worker))
    }

    /// Remove a session only if it is still generation `session_id`
    pub async fn remove_generation(
        &self,
        camera_id: &str,
        session_id: u64,
        status: StreamStatus,
    ) -> Option<(StreamSession, Option<TranscodeWorker>)> {
        let mut sessions = self.sessions.write().await;

        if sessions.get(camera_id)?.session_id != session_id {
            return None;
        }
        let mut session = sessions.remove(camera_id)?;
        drop(sessions);

        let worker = session.finish(status);
        Some((session, worker))
    }

    /// Ids of every registered camera
    pub async fn camera_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Per-session statistics, sorted by camera id
    pub async fn session_stats(&self) -> Vec<SessionStats> {
        let now = Instant::now();
        let mut stats: Vec<SessionStats> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| SessionStats {
                camera_id: s.camera_id.clone(),
                session_id: s.session_id,
                status: s.status(),
                uptime: now.duration_since(s.started_at),
                time_to_active: s.activated_at.map(|t| t.duration_since(s.started_at)),
                subscribers: 0,
            })
            .collect();
        stats.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        stats
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
