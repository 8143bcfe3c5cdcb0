//! HTTP routes

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::state::AppState;
use super::ws::websocket_handler;
use crate::cameras::{Camera, CameraStore, StreamUpdate};
use crate::error::{Error, Result};
use crate::hub::GlobalEvent;
use crate::supervisor::validate_camera_id;

/// API and WebSocket routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/cameras", get(list_cameras))
        .route("/api/cameras/:id", get(get_camera))
        .route("/api/cameras/:id/stream/start", post(start_stream))
        .route("/api/cameras/:id/stream/stop", post(stop_stream))
        .route("/api/cameras/:id/stream/status", get(stream_status))
        .route("/api/streams", get(list_streams))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_cameras(State(state): State<AppState>) -> Json<Vec<Camera>> {
    Json(state.cameras.list_cameras().await)
}

async fn get_camera(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Camera>> {
    state
        .cameras
        .get_camera(&id)
        .await
        .map(Json)
        .ok_or(Error::CameraNotFound(id))
}

/// POST /api/cameras/:id/stream/start
async fn start_stream(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    validate_camera_id(&id)?;
    let camera = state
        .cameras
        .get_camera(&id)
        .await
        .ok_or_else(|| Error::CameraNotFound(id.clone()))?;
    let source = camera
        .stream_source()
        .ok_or_else(|| Error::CameraNotFound(format!("{} has no source configured", id)))?;

    if !state.supervisor.start_stream(&id, source).await {
        return Err(Error::StreamStart(id));
    }

    let url = state.supervisor.get_output_url(&id);
    state
        .cameras
        .update_stream(&id, StreamUpdate::started(url.clone()))
        .await?;
    state.hub.broadcast_global(&GlobalEvent::stream_started(&id)).await;

    Ok(Json(json!({
        "message": "Stream started successfully",
        "hlsUrl": url,
    })))
}

/// POST /api/cameras/:id/stream/stop
async fn stop_stream(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    validate_camera_id(&id)?;
    state.supervisor.stop_stream(&id).await;

    if let Err(e) = state.cameras.update_stream(&id, StreamUpdate::stopped()).await {
        tracing::debug!(camera_id = %id, error = %e, "Camera record not updated");
    }
    state.hub.broadcast_global(&GlobalEvent::stream_stopped(&id)).await;

    Ok(Json(json!({ "message": "Stream stopped successfully" })))
}

/// GET /api/cameras/:id/stream/status
async fn stream_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    validate_camera_id(&id)?;
    let status = state.supervisor.get_status(&id).await;
    Ok(Json(json!({ "cameraId": id, "status": status })))
}

/// GET /api/streams
async fn list_streams(State(state): State<AppState>) -> Json<Value> {
    let streams = state.supervisor.active_streams().await;
    let stats = state.supervisor.stats(state.hub.connection_count().await).await;

    Json(json!({ "streams": streams, "stats": stats }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cameras::MemoryCameraStore;
    use crate::hub::{Outbound, Outbox, RealtimeHub};
    use crate::registry::StreamStatus;
    use crate::supervisor::{StreamSupervisor, SupervisorConfig};
    use crate::worker::launcher::ScriptLauncher;

    fn app_state(root: &std::path::Path, launcher: ScriptLauncher) -> AppState {
        let hub = Arc::new(RealtimeHub::new());
        let config = SupervisorConfig::with_output_root(root)
            .observation_window(Duration::from_millis(1500))
            .termination_grace(Duration::from_millis(300))
            .readiness_poll_interval(Duration::from_millis(50));
        let supervisor = Arc::new(StreamSupervisor::new(
            config,
            Arc::new(launcher),
            Arc::clone(hub.subscriptions()),
        ));
        let cameras = Arc::new(MemoryCameraStore::with_cameras([
            Camera::new("cam-1", "Main Entrance").with_source("rtsp://10.0.0.5/live"),
            Camera::new("cam-5", "Hallway B"),
        ]));

        AppState::new(supervisor, hub, cameras)
    }

    async fn next_type(outbox: &mut Outbox) -> String {
        match outbox.recv().await {
            Some(Outbound::Frame(frame)) => {
                let value: Value = serde_json::from_slice(&frame).unwrap();
                value["type"].as_str().unwrap().to_string()
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_routes() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path(), ScriptLauncher::healthy());
        let (_observer, mut outbox) = state.hub.register().await;

        let Json(body) = start_stream(State(state.clone()), Path("cam-1".into()))
            .await
            .unwrap();
        assert_eq!(body["hlsUrl"], "/streams/cam-1/stream.m3u8");
        assert_eq!(next_type(&mut outbox).await, "STREAM_STARTED");

        let camera = state.cameras.get_camera("cam-1").await.unwrap();
        assert_eq!(camera.stream_status, StreamStatus::Active);
        assert_eq!(camera.output_url.as_deref(), Some("/streams/cam-1/stream.m3u8"));

        let Json(body) = stream_status(State(state.clone()), Path("cam-1".into()))
            .await
            .unwrap();
        assert_eq!(body, json!({"cameraId": "cam-1", "status": "active"}));

        let Json(body) = list_streams(State(state.clone())).await;
        assert_eq!(body["streams"], json!(["cam-1"]));
        assert_eq!(body["stats"]["observers"], 1);

        stop_stream(State(state.clone()), Path("cam-1".into()))
            .await
            .unwrap();
        assert_eq!(next_type(&mut outbox).await, "STREAM_STOPPED");

        let camera = state.cameras.get_camera("cam-1").await.unwrap();
        assert_eq!(camera.stream_status, StreamStatus::Inactive);
        assert!(camera.output_url.is_none());
        assert!(!dir.path().join("cam-1").exists());
    }

    #[tokio::test]
    async fn test_start_unknown_or_sourceless_camera() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path(), ScriptLauncher::healthy());

        let err = start_stream(State(state.clone()), Path("cam-404".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CameraNotFound(_)));

        let err = start_stream(State(state.clone()), Path("cam-5".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CameraNotFound(_)));
        assert!(state.supervisor.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_start_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path(), ScriptLauncher::missing());

        let err = start_stream(State(state.clone()), Path("cam-1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamStart(_)));

        let camera = state.cameras.get_camera("cam-1").await.unwrap();
        assert_eq!(camera.stream_status, StreamStatus::Inactive);
    }

    #[tokio::test]
    async fn test_stop_unknown_camera_still_answers() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path(), ScriptLauncher::healthy());

        let Json(body) = stop_stream(State(state), Path("cam-404".into()))
            .await
            .unwrap();
        assert_eq!(body["message"], "Stream stopped successfully");
    }

    #[tokio::test]
    async fn test_invalid_camera_id_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path(), ScriptLauncher::healthy());

        let err = start_stream(State(state.clone()), Path("cam 1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(
            axum::response::IntoResponse::into_response(err).status(),
            axum::http::StatusCode::BAD_REQUEST
        );

        let err = stop_stream(State(state.clone()), Path("..".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = stream_status(State(state.clone()), Path("cam 1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(state.supervisor.registry().is_empty().await);
    }
}
