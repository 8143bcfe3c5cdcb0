//! Supervisor configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::worker::handle::{DEFAULT_POLL_INTERVAL, DEFAULT_TERMINATION_GRACE};
use crate::worker::WorkerOptions;

/// Supervisor configuration options
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directory holding one output directory per camera
    pub output_root: PathBuf,

    /// File name of the playlist inside each camera directory
    pub manifest_name: String,

    /// URL path under which `output_root` is served
    pub public_prefix: String,

    /// How long `start_stream` waits for the first status change
    pub observation_window: Duration,

    /// Grace period between a stop request and a forced kill
    pub termination_grace: Duration,

    /// Manifest polling interval while a worker is starting
    pub readiness_poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("public/streams"),
            manifest_name: "stream.m3u8".to_string(),
            public_prefix: "/streams".to_string(),
            observation_window: Duration::from_secs(2),
            termination_grace: DEFAULT_TERMINATION_GRACE,
            readiness_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SupervisorConfig {
    /// Create a new config writing under `root`
    pub fn with_output_root(root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: root.into(),
            ..Default::default()
        }
    }

    /// Set the output root
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Set the URL prefix; a trailing slash is dropped
    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.public_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// Set the start observation window
    pub fn observation_window(mut self, window: Duration) -> Self {
        self.observation_window = window;
        self
    }

    /// Set the termination grace period
    pub fn termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    /// Set the manifest polling interval (at least 10ms)
    pub fn readiness_poll_interval(mut self, interval: Duration) -> Self {
        self.readiness_poll_interval = interval.max(Duration::from_millis(10));
        self
    }

    /// Output directory of one camera
    pub fn output_dir(&self, camera_id: &str) -> PathBuf {
        self.output_root.join(camera_id)
    }

    /// Public URL of a camera's playlist
    pub fn output_url(&self, camera_id: &str) -> String {
        format!("{}/{}/{}", self.public_prefix, camera_id, self.manifest_name)
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            termination_grace: self.termination_grace,
            poll_interval: self.readiness_poll_interval,
        }
    }
}

/// Reject camera ids that cannot name a single directory under the root
pub fn validate_camera_id(camera_id: &str) -> Result<()> {
    let valid = !camera_id.is_empty()
        && camera_id != "."
        && camera_id != ".."
        && camera_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("invalid camera id {:?}", camera_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();

        assert_eq!(config.output_root, PathBuf::from("public/streams"));
        assert_eq!(config.manifest_name, "stream.m3u8");
        assert_eq!(config.observation_window, Duration::from_secs(2));
        assert_eq!(config.termination_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_paths_and_url() {
        let config = SupervisorConfig::with_output_root("/var/hls");

        assert_eq!(config.output_dir("cam-1"), PathBuf::from("/var/hls/cam-1"));
        assert_eq!(config.output_url("cam-1"), "/streams/cam-1/stream.m3u8");
    }

    #[test]
    fn test_public_prefix_trailing_slash() {
        let config = SupervisorConfig::default().public_prefix("/media/hls/");

        assert_eq!(config.output_url("x"), "/media/hls/x/stream.m3u8");
    }

    #[test]
    fn test_builder_chaining() {
        let config = SupervisorConfig::default()
            .output_root("/tmp/out")
            .observation_window(Duration::from_millis(500))
            .termination_grace(Duration::from_secs(1))
            .readiness_poll_interval(Duration::from_millis(1));

        assert_eq!(config.output_root, PathBuf::from("/tmp/out"));
        assert_eq!(config.observation_window, Duration::from_millis(500));

        let options = config.worker_options();
        assert_eq!(options.termination_grace, Duration::from_secs(1));
        assert_eq!(options.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_camera_id_validation() {
        assert!(validate_camera_id("cam-1").is_ok());
        assert!(validate_camera_id("6f1c2a9e-8d1b-4c55-9a3e-0b7f2d4c1e88").is_ok());
        assert!(validate_camera_id("front_door.v2").is_ok());

        for bad in ["", ".", "..", "../etc", "a/b", "cam 1"] {
            assert!(validate_camera_id(bad).is_err(), "accepted {:?}", bad);
        }
    }
}
