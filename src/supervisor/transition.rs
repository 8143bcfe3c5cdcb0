//! Session state machine
//!
//! ```text
//!  (no session) --start--> starting --[BecameActive]--> active
//!  starting|active --[Exited(0)]--------------------> stopped --(removed)
//!  starting|active --[Exited(n≠0) | RuntimeError]---> error   --(removed)
//!  starting|active --stop---------------------------> stopped --(removed)
//! ```
//!
//! Worker signals are the only input handled here; explicit stops are
//! applied directly by the supervisor.

use crate::hub::StreamEventKind;
use crate::registry::StreamStatus;
use crate::worker::WorkerSignal;

/// Effect of one worker signal on a session
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// `starting` to `active`, notify subscribers
    Activate(StreamEventKind),
    /// Session ends in `status` and is removed, notify subscribers
    Finish {
        status: StreamStatus,
        event: StreamEventKind,
    },
    /// No state change
    Ignore,
}

/// Transition function for a session currently in `current`
pub fn on_signal(current: StreamStatus, signal: &WorkerSignal) -> Transition {
    if !current.is_live() {
        return Transition::Ignore;
    }

    match signal {
        WorkerSignal::BecameActive if current == StreamStatus::Starting => {
            Transition::Activate(StreamEventKind::StreamActive)
        }
        WorkerSignal::BecameActive => Transition::Ignore,
        WorkerSignal::Exited(code) => Transition::Finish {
            status: if *code == Some(0) {
                StreamStatus::Stopped
            } else {
                StreamStatus::Error
            },
            event: StreamEventKind::StreamStopped { code: *code },
        },
        WorkerSignal::RuntimeError(message) => Transition::Finish {
            status: StreamStatus::Error,
            event: StreamEventKind::StreamError {
                error: message.clone(),
            },
        },
    }
}
