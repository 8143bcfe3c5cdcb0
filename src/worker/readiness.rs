//! Readiness detection
//!
//! A worker is considered active once the converter reports that it opened
//! the source and found a stream, or once the output manifest exists on
//! disk. Either probe may fire first; the signal is raised only once.

use std::path::PathBuf;

/// Diagnostic substrings that indicate the input was opened
pub const READY_MARKERS: &[&str] = &["Opening", "Stream #"];

/// One-shot readiness tracker for a single worker
#[derive(Debug)]
pub struct ReadinessProbe {
    manifest: PathBuf,
    ready: bool,
}

impl ReadinessProbe {
    pub fn new(manifest: PathBuf) -> Self {
        Self {
            manifest,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Feed one diagnostic line. Returns true on the not-ready to ready edge.
    pub fn observe_line(&mut self, line: &str) -> bool {
        if self.ready {
            return false;
        }
        if READY_MARKERS.iter().any(|m| line.contains(m)) {
            self.ready = true;
            return true;
        }
        false
    }

    /// Check for the manifest file. Returns true on the not-ready to ready edge.
    pub async fn probe_manifest(&mut self) -> bool {
        if self.ready {
            return false;
        }
        if tokio::fs::try_exists(&self.manifest).await.unwrap_or(false) {
            self.ready = true;
            return true;
        }
        false
    }
}
