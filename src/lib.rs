//! Live camera stream orchestration
//!
//! Supervises one converter process per camera that turns a network video
//! source into a rolling HLS playlist, tracks each camera's stream status and
//! pushes lifecycle events to dashboard observers over WebSocket.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camstream::hub::RealtimeHub;
//! use camstream::supervisor::{StreamSupervisor, SupervisorConfig};
//!
//! # async fn demo() {
//! let hub = Arc::new(RealtimeHub::new());
//! let supervisor = StreamSupervisor::with_ffmpeg(
//!     SupervisorConfig::default(),
//!     Arc::clone(hub.subscriptions()),
//! );
//!
//! if supervisor.start_stream("cam-1", "rtsp://10.0.0.5/live").await {
//!     println!("playing at {}", supervisor.get_output_url("cam-1"));
//! }
//! supervisor.stop_all().await;
//! # }
//! ```

pub mod cameras;
pub mod error;
pub mod hub;
pub mod registry;
pub mod server;
pub mod stats;
pub mod supervisor;
pub mod worker;

pub use error::{Error, Result};
pub use hub::{Connection, GlobalEvent, RealtimeHub, StreamEvent};
pub use registry::{StreamRegistry, StreamStatus};
pub use server::{HttpServer, ServerConfig};
pub use supervisor::{StreamSupervisor, SupervisorConfig};
pub use worker::{FfmpegLauncher, Launcher, TranscodeWorker, WorkerSignal};
