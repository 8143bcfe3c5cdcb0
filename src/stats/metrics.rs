//! Statistics for stream sessions and the supervisor

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::registry::StreamStatus;

/// Session-level statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Camera id
    pub camera_id: String,
    /// Session generation
    pub session_id: u64,
    /// Current status
    pub status: StreamStatus,
    /// Time since the session was registered
    #[serde(with = "millis")]
    pub uptime: Duration,
    /// Time from registration to the first readiness signal
    #[serde(with = "opt_millis")]
    pub time_to_active: Option<Duration>,
    /// Observers subscribed to this camera
    pub subscribers: usize,
}

/// Lifetime counters kept by the supervisor
#[derive(Debug, Default)]
pub struct SupervisorCounters {
    starts: AtomicU64,
    failed_starts: AtomicU64,
    stops: AtomicU64,
    worker_exits: AtomicU64,
    worker_errors: AtomicU64,
}

impl SupervisorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self, success: bool) {
        self.starts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_starts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    /// Worker ended on its own; `error` when it failed
    pub fn record_exit(&self, error: bool) {
        self.worker_exits.fetch_add(1, Ordering::Relaxed);
        if error {
            self.worker_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy, combined with live gauges
    pub fn snapshot(&self, sessions: Vec<SessionStats>, observers: usize) -> SupervisorStats {
        SupervisorStats {
            active_streams: sessions
                .iter()
                .filter(|s| s.status == StreamStatus::Active)
                .count(),
            starting_streams: sessions
                .iter()
                .filter(|s| s.status == StreamStatus::Starting)
                .count(),
            starts: self.starts.load(Ordering::Relaxed),
            failed_starts: self.failed_starts.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            worker_exits: self.worker_exits.load(Ordering::Relaxed),
            worker_errors: self.worker_errors.load(Ordering::Relaxed),
            observers,
            sessions,
        }
    }
}

/// Supervisor-wide statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStats {
    pub active_streams: usize,
    pub starting_streams: usize,
    pub starts: u64,
    pub failed_starts: u64,
    pub stops: u64,
    pub worker_exits: u64,
    pub worker_errors: u64,
    /// Connected dashboard observers
    pub observers: usize,
    pub sessions: Vec<SessionStats>,
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }
}
