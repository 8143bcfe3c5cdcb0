//! Statistics snapshots

pub mod metrics;

pub use metrics::{SessionStats, SupervisorCounters, SupervisorStats};
