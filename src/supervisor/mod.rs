//! Stream lifecycle orchestration
//!
//! The supervisor turns start/stop requests into worker processes and keeps
//! the registry, the subscription registry and the output directory of each
//! camera consistent with one another.
//!
//! ```text
//!   start_stream ─► CameraLocks ─► TranscodeWorker::spawn ─► StreamRegistry
//!                                        │ signals
//!                                        ▼
//!                                   SignalPump ─► transition ─► subscribers
//! ```
//!
//! Start and stop of the same camera are serialized by a per-camera lock.
//! Worker signals never take that lock before publishing a status change,
//! so a start waiting out its observation window sees early failures.

pub mod config;
pub mod locks;
mod pump;
pub mod transition;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;

pub use config::{validate_camera_id, SupervisorConfig};
pub use locks::{CameraLease, CameraLocks};
pub use transition::Transition;

use crate::error::{Error, Result};
use crate::hub::{broadcast, Connection, StreamEvent, SubscriptionRegistry};
use crate::registry::{StreamRegistry, StreamSession, StreamStatus};
use crate::stats::{SupervisorCounters, SupervisorStats};
use crate::worker::{FfmpegLauncher, Launcher, TranscodeWorker};
use pump::SignalPump;

/// Owner of every camera's stream session
pub struct StreamSupervisor {
    config: SupervisorConfig,
    launcher: Arc<dyn Launcher>,
    registry: Arc<StreamRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    locks: Arc<CameraLocks>,
    counters: Arc<SupervisorCounters>,
    next_session_id: AtomicU64,
}

impl StreamSupervisor {
    pub fn new(
        config: SupervisorConfig,
        launcher: Arc<dyn Launcher>,
        subscriptions: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            config,
            launcher,
            registry: Arc::new(StreamRegistry::new()),
            subscriptions,
            locks: Arc::new(CameraLocks::new()),
            counters: Arc::new(SupervisorCounters::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Supervisor driving the default `ffmpeg` converter
    pub fn with_ffmpeg(config: SupervisorConfig, subscriptions: Arc<SubscriptionRegistry>) -> Self {
        Self::new(config, Arc::new(FfmpegLauncher::default()), subscriptions)
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Start streaming a camera, replacing any session it already has
    ///
    /// Returns whether the session is still live (`starting` or `active`)
    /// once the worker reported its first status change or the observation
    /// window elapsed, whichever came first. Failures are logged, never
    /// returned.
    pub async fn start_stream(&self, camera_id: &str, source_uri: &str) -> bool {
        match self.try_start(camera_id, source_uri).await {
            Ok(status) => {
                let live = status.is_live();
                self.counters.record_start(live);

                if live {
                    tracing::info!(camera_id = %camera_id, status = %status, "Stream started");
                } else {
                    tracing::warn!(camera_id = %camera_id, status = %status, "Stream failed to start");
                }
                live
            }
            Err(e) => {
                self.counters.record_start(false);
                tracing::warn!(camera_id = %camera_id, error = %e, "Stream start rejected");
                false
            }
        }
    }

    async fn try_start(&self, camera_id: &str, source_uri: &str) -> Result<StreamStatus> {
        validate_camera_id(camera_id)?;
        if source_uri.trim().is_empty() {
            return Err(Error::InvalidRequest("empty source uri".into()));
        }

        let _lease = self.locks.acquire(camera_id).await;

        if self.registry.contains(camera_id).await {
            tracing::info!(camera_id = %camera_id, "Restarting stream");
            self.stop_locked(camera_id).await;
        }

        let output_dir = self.config.output_dir(camera_id);
        let spawned = TranscodeWorker::spawn(
            camera_id,
            source_uri,
            &output_dir,
            &self.config.manifest_name,
            self.launcher.as_ref(),
            self.config.worker_options(),
        )
        .await;

        let (worker, signals) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                remove_dir(camera_id, &output_dir).await;
                return Err(e);
            }
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = StreamSession::new(camera_id, session_id, source_uri, worker);
        let mut status_rx = session.watch();
        self.registry.insert(session).await;

        let pump = SignalPump {
            camera_id: camera_id.to_string(),
            session_id,
            registry: Arc::clone(&self.registry),
            subscriptions: Arc::clone(&self.subscriptions),
            locks: Arc::clone(&self.locks),
            counters: Arc::clone(&self.counters),
        };
        tokio::spawn(pump.run(signals));

        // Elapsed window leaves the session in `starting`
        let _ = tokio::time::timeout(
            self.config.observation_window,
            status_rx.wait_for(|status| *status != StreamStatus::Starting),
        )
        .await;

        let status = *status_rx.borrow();
        Ok(status)
    }

    /// Stop a camera's stream
    ///
    /// Closes every subscriber of the camera, waits for the worker to exit
    /// and removes its output directory. A camera without a session is a
    /// no-op apart from removing leftover output.
    pub async fn stop_stream(&self, camera_id: &str) {
        if let Err(e) = validate_camera_id(camera_id) {
            tracing::debug!(camera_id = %camera_id, error = %e, "Stop ignored");
            return;
        }

        let _lease = self.locks.acquire(camera_id).await;
        self.stop_locked(camera_id).await;
    }

    /// Stop with the camera lock already held
    async fn stop_locked(&self, camera_id: &str) {
        let removed = self.registry.remove(camera_id, StreamStatus::Stopped).await;

        let Some((session, worker)) = removed else {
            tracing::debug!(camera_id = %camera_id, "No session to stop");
            remove_dir(camera_id, &self.config.output_dir(camera_id)).await;
            return;
        };

        self.counters.record_stop();

        let subscribers = self.subscriptions.take(camera_id).await;
        for conn in &subscribers {
            conn.close();
        }

        if let Some(mut worker) = worker {
            worker.terminate().await;
            if let Err(e) = worker.remove_artifacts().await {
                tracing::warn!(camera_id = %camera_id, error = %e, "Failed to remove stream output");
            }
        }

        tracing::info!(
            camera_id = %camera_id,
            session_id = session.session_id,
            subscribers = subscribers.len(),
            uptime_ms = session.started_at.elapsed().as_millis() as u64,
            "Stream stopped"
        );
    }

    /// Stop every live session concurrently
    pub async fn stop_all(&self) {
        let camera_ids = self.registry.camera_ids().await;
        if camera_ids.is_empty() {
            return;
        }

        tracing::info!(streams = camera_ids.len(), "Stopping all streams");
        join_all(camera_ids.iter().map(|id| self.stop_stream(id))).await;
    }

    /// Current status; `inactive` when the camera has no session
    pub async fn get_status(&self, camera_id: &str) -> StreamStatus {
        self.registry.status(camera_id).await
    }

    /// Subscribe an observer to a camera's stream events
    ///
    /// Only cameras with a live session accept subscribers. The observer
    /// first receives a `status` event carrying the current status, before
    /// any later lifecycle event.
    pub async fn subscribe(&self, camera_id: &str, conn: Connection) -> bool {
        let mut subscriptions = self.subscriptions.lock().await;

        let status = self.registry.status(camera_id).await;
        if !status.is_live() {
            tracing::debug!(camera_id = %camera_id, connection_id = %conn.id(), "No live session to subscribe to");
            return false;
        }

        broadcast(&StreamEvent::status(camera_id, status), [&conn]);
        subscriptions.insert(camera_id, conn);
        true
    }

    /// Remove an observer from a camera's subscribers
    pub async fn unsubscribe(&self, camera_id: &str, conn: &Connection) -> bool {
        self.subscriptions.remove(camera_id, &conn.id()).await
    }

    /// Cameras with a live session, sorted
    pub async fn active_streams(&self) -> Vec<String> {
        let mut ids = self.registry.camera_ids().await;
        ids.sort();
        ids
    }

    /// Public playlist URL of a camera
    pub fn get_output_url(&self, camera_id: &str) -> String {
        self.config.output_url(camera_id)
    }

    /// Counters and per-session statistics
    pub async fn stats(&self, observers: usize) -> SupervisorStats {
        let mut sessions = self.registry.session_stats().await;
        for session in &mut sessions {
            session.subscribers = self.subscriptions.subscriber_count(&session.camera_id).await;
        }
        self.counters.snapshot(sessions, observers)
    }
}

impl std::fmt::Debug for StreamSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSupervisor")
            .field("config", &self.config)
            .field("program", &self.launcher.program())
            .finish_non_exhaustive()
    }
}

async fn remove_dir(camera_id: &str, dir: &std::path::Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!(camera_id = %camera_id, dir = %dir.display(), "Leftover output removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(camera_id = %camera_id, error = %e, "Failed to remove stream output"),
    }
}
