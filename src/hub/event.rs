//! Wire event shapes
//!
//! Per-camera events are flat JSON objects keyed by `type`:
//! `{"cameraId":"cam-1","type":"stream_stopped","code":1}`.
//! Global dashboard events carry their entity under `data`:
//! `{"type":"ALERT_CREATED","data":{...}}`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::StreamStatus;

/// Event delivered to observers subscribed to one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "cameraId")]
    pub camera_id: String,

    #[serde(flatten)]
    pub kind: StreamEventKind,
}

/// Per-camera event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Worker reported an opened source
    StreamActive,
    /// Worker exited; `code` is null when ended by a signal
    StreamStopped { code: Option<i32> },
    /// Worker failed at runtime
    StreamError { error: String },
    /// Snapshot sent to a new subscriber
    Status { status: StreamStatus },
}

impl StreamEvent {
    pub fn new(camera_id: impl Into<String>, kind: StreamEventKind) -> Self {
        Self {
            camera_id: camera_id.into(),
            kind,
        }
    }

    /// Synthetic first event for a new subscriber
    pub fn status(camera_id: impl Into<String>, status: StreamStatus) -> Self {
        Self::new(camera_id, StreamEventKind::Status { status })
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            StreamEventKind::StreamActive => "stream_active",
            StreamEventKind::StreamStopped { .. } => "stream_stopped",
            StreamEventKind::StreamError { .. } => "stream_error",
            StreamEventKind::Status { .. } => "status",
        }
    }
}

/// Reference to a camera in global stream notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRef {
    #[serde(rename = "cameraId")]
    pub camera_id: String,
}

/// Event delivered to every dashboard observer
///
/// Entity payloads belong to the CRUD layer and are carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalEvent {
    AlertCreated(serde_json::Value),
    AlertResolved(serde_json::Value),
    CameraAdded(serde_json::Value),
    CameraUpdated(serde_json::Value),
    LocationAdded(serde_json::Value),
    SearchCompleted(serde_json::Value),
    AiIncidentDetected(serde_json::Value),
    StreamStarted(StreamRef),
    StreamStopped(StreamRef),
}

impl GlobalEvent {
    pub fn stream_started(camera_id: impl Into<String>) -> Self {
        GlobalEvent::StreamStarted(StreamRef {
            camera_id: camera_id.into(),
        })
    }

    pub fn stream_stopped(camera_id: impl Into<String>) -> Self {
        GlobalEvent::StreamStopped(StreamRef {
            camera_id: camera_id.into(),
        })
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            GlobalEvent::AlertCreated(_) => "ALERT_CREATED",
            GlobalEvent::AlertResolved(_) => "ALERT_RESOLVED",
            GlobalEvent::CameraAdded(_) => "CAMERA_ADDED",
            GlobalEvent::CameraUpdated(_) => "CAMERA_UPDATED",
            GlobalEvent::LocationAdded(_) => "LOCATION_ADDED",
            GlobalEvent::SearchCompleted(_) => "SEARCH_COMPLETED",
            GlobalEvent::AiIncidentDetected(_) => "AI_INCIDENT_DETECTED",
            GlobalEvent::StreamStarted(_) => "STREAM_STARTED",
            GlobalEvent::StreamStopped(_) => "STREAM_STOPPED",
        }
    }
}

/// Messages observers send over their connection
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SubscribeCamera {
        #[serde(rename = "cameraId")]
        camera_id: String,
    },
    UnsubscribeCamera {
        #[serde(rename = "cameraId")]
        camera_id: String,
    },
}

/// Serialize once into a shared frame
///
/// `Bytes` is reference counted, so every target of a broadcast shares the
/// same allocation.
pub fn encode<T: Serialize>(event: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(event)?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn to_json<T: Serialize>(event: &T) -> serde_json::Value {
        serde_json::from_slice(&encode(event).unwrap()).unwrap()
    }

    #[test]
    fn test_stream_event_shapes() {
        assert_eq!(
            to_json(&StreamEvent::new("cam-1", StreamEventKind::StreamActive)),
            json!({"cameraId": "cam-1", "type": "stream_active"})
        );
        assert_eq!(
            to_json(&StreamEvent::new(
                "cam-2",
                StreamEventKind::StreamStopped { code: Some(1) }
            )),
            json!({"cameraId": "cam-2", "type": "stream_stopped", "code": 1})
        );
        assert_eq!(
            to_json(&StreamEvent::new(
                "cam-2",
                StreamEventKind::StreamStopped { code: None }
            )),
            json!({"cameraId": "cam-2", "type": "stream_stopped", "code": null})
        );
        assert_eq!(
            to_json(&StreamEvent::new(
                "cam-3",
                StreamEventKind::StreamError {
                    error: "spawn failed".into()
                }
            )),
            json!({"cameraId": "cam-3", "type": "stream_error", "error": "spawn failed"})
        );
        assert_eq!(
            to_json(&StreamEvent::status("cam-1", StreamStatus::Active)),
            json!({"cameraId": "cam-1", "type": "status", "status": "active"})
        );
    }

    #[test]
    fn test_global_event_shapes() {
        assert_eq!(
            to_json(&GlobalEvent::AlertCreated(json!({"id": "a1", "severity": "high"}))),
            json!({"type": "ALERT_CREATED", "data": {"id": "a1", "severity": "high"}})
        );
        assert_eq!(
            to_json(&GlobalEvent::AiIncidentDetected(json!({"cameraId": "cam-1"}))),
            json!({"type": "AI_INCIDENT_DETECTED", "data": {"cameraId": "cam-1"}})
        );
        assert_eq!(
            to_json(&GlobalEvent::stream_started("cam-1")),
            json!({"type": "STREAM_STARTED", "data": {"cameraId": "cam-1"}})
        );
    }

    #[test]
    fn test_event_type_names_match_wire() {
        let events = [
            GlobalEvent::AlertResolved(json!({})),
            GlobalEvent::CameraAdded(json!({})),
            GlobalEvent::CameraUpdated(json!({})),
            GlobalEvent::LocationAdded(json!({})),
            GlobalEvent::SearchCompleted(json!({})),
            GlobalEvent::stream_stopped("cam-1"),
        ];
        for event in events {
            assert_eq!(to_json(&event)["type"], event.event_type());
        }

        let event = StreamEvent::new("cam-1", StreamEventKind::StreamError { error: "x".into() });
        assert_eq!(to_json(&event)["type"], event.event_type());
    }

    #[test]
    fn test_client_message_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"SUBSCRIBE_CAMERA","cameraId":"cam-9"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubscribeCamera {
                camera_id: "cam-9".into()
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"UNSUBSCRIBE_CAMERA","cameraId":"cam-9"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::UnsubscribeCamera { .. }));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"PING"}"#).is_err());
    }
}
