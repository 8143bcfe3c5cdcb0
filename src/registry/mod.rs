//! Stream registry
//!
//! Single source of truth for what each camera's stream is doing right now.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StreamRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ sessions: HashMap<cameraId,  │
//!                 │   StreamSession {            │
//!                 │     status, session_id,      │
//!                 │     worker: TranscodeWorker, │
//!                 │   }                          │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!           ┌────────────────────┼────────────────────┐
//!           ▼                    ▼                    ▼
//!    start/stop (locked)   worker signal pump    status reads
//! ```
//!
//! Only `starting` and `active` sessions are stored. Reaching `error` or
//! `stopped` removes the session in the same write; the worker is handed
//! back to the caller for teardown outside the lock.

pub mod entry;
pub mod store;

pub use entry::{StreamSession, StreamStatus};
pub use store::StreamRegistry;
