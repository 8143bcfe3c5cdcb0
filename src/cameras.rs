//! Camera records
//!
//! The stream routes only need to look a camera up by id and to record the
//! outcome of a start or stop on it. [`CameraStore`] is that seam; the
//! in-memory store backs the binary and the tests.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::registry::StreamStatus;

/// A camera as seen by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location_id: Option<String>,
    /// Network source; cameras without one cannot stream
    #[serde(default)]
    pub source_uri: Option<String>,
    #[serde(default = "inactive")]
    pub stream_status: StreamStatus,
    /// Public playlist URL while streaming
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default = "online")]
    pub is_online: bool,
}

fn inactive() -> StreamStatus {
    StreamStatus::Inactive
}

fn online() -> bool {
    true
}

impl Camera {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location_id: None,
            source_uri: None,
            stream_status: StreamStatus::Inactive,
            output_url: None,
            is_online: true,
        }
    }

    pub fn with_source(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// Source URI if set and non-blank
    pub fn stream_source(&self) -> Option<&str> {
        self.source_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }
}

/// Stream fields written back after a start or stop
#[derive(Debug, Clone, PartialEq)]
pub struct StreamUpdate {
    pub stream_status: StreamStatus,
    pub output_url: Option<String>,
}

impl StreamUpdate {
    pub fn started(output_url: impl Into<String>) -> Self {
        Self {
            stream_status: StreamStatus::Active,
            output_url: Some(output_url.into()),
        }
    }

    pub fn stopped() -> Self {
        Self {
            stream_status: StreamStatus::Inactive,
            output_url: None,
        }
    }
}

/// Camera lookup and stream bookkeeping
#[async_trait]
pub trait CameraStore: Send + Sync {
    async fn get_camera(&self, id: &str) -> Option<Camera>;

    async fn list_cameras(&self) -> Vec<Camera>;

    /// Apply `update`, returning the updated record
    async fn update_stream(&self, id: &str, update: StreamUpdate) -> Result<Camera>;
}

/// Camera store held in memory
#[derive(Debug, Default)]
pub struct MemoryCameraStore {
    cameras: RwLock<HashMap<String, Camera>>,
}

impl MemoryCameraStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cameras(cameras: impl IntoIterator<Item = Camera>) -> Self {
        Self {
            cameras: RwLock::new(cameras.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }

    /// Load a JSON array of cameras
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path).await?;
        let cameras: Vec<Camera> = serde_json::from_slice(&raw)?;

        tracing::info!(path = %path.display(), cameras = cameras.len(), "Camera list loaded");
        Ok(Self::with_cameras(cameras))
    }

    /// Insert or replace a camera
    pub async fn insert(&self, camera: Camera) -> Option<Camera> {
        self.cameras.write().await.insert(camera.id.clone(), camera)
    }
}

#[async_trait]
impl CameraStore for MemoryCameraStore {
    async fn get_camera(&self, id: &str) -> Option<Camera> {
        self.cameras.read().await.get(id).cloned()
    }

    async fn list_cameras(&self) -> Vec<Camera> {
        let mut cameras: Vec<Camera> = self.cameras.read().await.values().cloned().collect();
        cameras.sort_by(|a, b| a.name.cmp(&b.name));
        cameras
    }

    async fn update_stream(&self, id: &str, update: StreamUpdate) -> Result<Camera> {
        let mut cameras = self.cameras.write().await;
        let camera = cameras
            .get_mut(id)
            .ok_or_else(|| Error::CameraNotFound(id.to_string()))?;

        camera.stream_status = update.stream_status;
        camera.output_url = update.output_url;
        Ok(camera.clone())
    }
}
