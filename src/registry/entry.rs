//! Stream session and status types
//!
//! This module defines the per-camera state stored in the registry.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::worker::TranscodeWorker;

/// Status of a camera's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Worker spawned, source not yet confirmed
    Starting,
    /// Worker reported an opened source
    Active,
    /// Worker failed or exited non-zero
    Error,
    /// Worker exited cleanly or was stopped
    Stopped,
    /// No session; never stored in the registry
    Inactive,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Starting => "starting",
            StreamStatus::Active => "active",
            StreamStatus::Error => "error",
            StreamStatus::Stopped => "stopped",
            StreamStatus::Inactive => "inactive",
        }
    }

    /// States that own a running worker
    pub fn is_live(&self) -> bool {
        matches!(self, StreamStatus::Starting | StreamStatus::Active)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One camera's in-flight or active stream
///
/// `worker` is `Some` exactly while `status` is live. Sessions that reach a
/// terminal status are removed from the registry in the same step.
#[derive(Debug)]
pub struct StreamSession {
    /// Camera this session belongs to
    pub camera_id: String,

    /// Generation id; signals from older workers carry a stale id
    pub session_id: u64,

    /// Network source of the camera
    pub source_uri: String,

    /// Manifest path the worker writes to
    pub output_target: PathBuf,

    /// Current status
    status: StreamStatus,

    /// Owned converter process
    worker: Option<TranscodeWorker>,

    /// Status feed for callers waiting on the first transition
    status_tx: watch::Sender<StreamStatus>,

    /// When the session was registered
    pub started_at: Instant,

    /// When the worker first reported an opened source
    pub activated_at: Option<Instant>,
}

impl StreamSession {
    /// Create a `starting` session owning `worker`
    pub fn new(
        camera_id: impl Into<String>,
        session_id: u64,
        source_uri: impl Into<String>,
        worker: TranscodeWorker,
    ) -> Self {
        let (status_tx, _) = watch::channel(StreamStatus::Starting);

        Self {
            camera_id: camera_id.into(),
            session_id,
            source_uri: source_uri.into(),
            output_target: worker.manifest().to_path_buf(),
            status: StreamStatus::Starting,
            worker: Some(worker),
            status_tx,
            started_at: Instant::now(),
            activated_at: None,
        }
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Watch status changes of this session
    pub fn watch(&self) -> watch::Receiver<StreamStatus> {
        self.status_tx.subscribe()
    }

    /// `starting` to `active`. Returns false if already past starting.
    pub(super) fn activate(&mut self) -> bool {
        if self.status != StreamStatus::Starting {
            return false;
        }
        self.status = StreamStatus::Active;
        self.activated_at = Some(Instant::now());
        self.status_tx.send_replace(StreamStatus::Active);
        true
    }

    /// Move to a terminal status, giving up the worker
    pub(super) fn finish(&mut self, status: StreamStatus) -> Option<TranscodeWorker> {
        debug_assert!(!status.is_live());
        self.status = status;
        self.status_tx.send_replace(status);
        self.worker.take()
    }
}
