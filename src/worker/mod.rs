//! Transcoding workers
//!
//! A worker wraps one external converter process that reads a camera's
//! network source and writes segmented HLS output into a per-camera
//! directory. After spawn its lifecycle is visible only as
//! [`WorkerSignal`]s: `BecameActive`, `Exited(code)` or `RuntimeError`.

pub mod diagnostics;
pub mod handle;
pub mod launcher;
pub mod readiness;

pub use handle::{TranscodeWorker, WorkerOptions, WorkerSignal};
pub use launcher::{FfmpegLauncher, Launcher};
pub use readiness::ReadinessProbe;
