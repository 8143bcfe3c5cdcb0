//! Error types
//!
//! Only failures that a caller can act on are represented here. Worker
//! runtime failures travel as [`WorkerSignal`](crate::worker::WorkerSignal)s
//! and termination timeouts are handled internally.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The external converter could not be started at all
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error (output directory creation, artifact removal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request rejected before reaching the supervisor
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Camera unknown to the camera store, or without a source URI
    #[error("camera not found: {0}")]
    CameraNotFound(String),

    /// A stream did not come up within its observation window
    #[error("failed to start stream for {0}")]
    StreamStart(String),

    /// Bad configuration value
    #[error("config error: {0}")]
    Config(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::CameraNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Error::StreamStart(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STREAM_START_FAILED"),
            Error::Launch { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "LAUNCH_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = json!({ "error": code, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
