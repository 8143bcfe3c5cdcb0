//! Per-session signal pump
//!
//! One task per spawned worker drains its signals, applies them to the
//! registry through the transition function and notifies the camera's
//! subscribers. Signals of a generation that is no longer registered are
//! dropped.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::locks::CameraLocks;
use super::transition::{on_signal, Transition};
use crate::hub::{StreamEvent, StreamEventKind, SubscriptionRegistry};
use crate::registry::{StreamRegistry, StreamStatus};
use crate::stats::SupervisorCounters;
use crate::worker::WorkerSignal;

pub(super) struct SignalPump {
    pub camera_id: String,
    pub session_id: u64,
    pub registry: Arc<StreamRegistry>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub locks: Arc<CameraLocks>,
    pub counters: Arc<SupervisorCounters>,
}

impl SignalPump {
    pub async fn run(self, mut signals: mpsc::UnboundedReceiver<WorkerSignal>) {
        while let Some(signal) = signals.recv().await {
            let Some(current) = self
                .registry
                .generation_status(&self.camera_id, self.session_id)
                .await
            else {
                tracing::debug!(
                    camera_id = %self.camera_id,
                    session_id = self.session_id,
                    signal = ?signal,
                    "Signal for retired session ignored"
                );
                return;
            };

            match on_signal(current, &signal) {
                Transition::Activate(event) => {
                    if self.registry.activate(&self.camera_id, self.session_id).await {
                        tracing::info!(camera_id = %self.camera_id, "Stream active");
                        self.notify(event).await;
                    }
                }
                Transition::Finish { status, event } => {
                    self.finish(status, event).await;
                    return;
                }
                Transition::Ignore => {}
            }
        }
    }

    async fn notify(&self, kind: StreamEventKind) {
        let event = StreamEvent::new(self.camera_id.clone(), kind);
        self.subscriptions.broadcast(&event).await;
    }

    async fn finish(&self, status: StreamStatus, event: StreamEventKind) {
        let Some((_, worker)) = self
            .registry
            .remove_generation(&self.camera_id, self.session_id, status)
            .await
        else {
            // An explicit stop got there first and owns the teardown
            return;
        };

        let error = status == StreamStatus::Error;
        self.counters.record_exit(error);
        if error {
            tracing::warn!(camera_id = %self.camera_id, event = ?event, "Stream failed");
        } else {
            tracing::info!(camera_id = %self.camera_id, "Stream ended");
        }

        self.notify(event).await;

        let _lease = self.locks.acquire(&self.camera_id).await;

        let Some(mut worker) = worker else {
            return;
        };
        worker.terminate().await;

        // A restart may already be writing into the same directory
        if self.registry.contains(&self.camera_id).await {
            return;
        }
        if let Err(e) = worker.remove_artifacts().await {
            tracing::warn!(camera_id = %self.camera_id, error = %e, "Failed to remove stream output");
        }
    }
}
