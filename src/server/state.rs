//! Shared handler state

use std::sync::Arc;

use crate::cameras::CameraStore;
use crate::hub::RealtimeHub;
use crate::supervisor::StreamSupervisor;

/// State cloned into every request handler
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<StreamSupervisor>,
    pub hub: Arc<RealtimeHub>,
    pub cameras: Arc<dyn CameraStore>,
}

impl AppState {
    pub fn new(
        supervisor: Arc<StreamSupervisor>,
        hub: Arc<RealtimeHub>,
        cameras: Arc<dyn CameraStore>,
    ) -> Self {
        Self {
            supervisor,
            hub,
            cameras,
        }
    }
}
