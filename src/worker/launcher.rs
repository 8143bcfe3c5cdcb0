//! Converter command construction
//!
//! A [`Launcher`] turns a source URI and a manifest path into the command
//! that performs the continuous conversion. The default [`FfmpegLauncher`]
//! produces low-latency HLS: short segments, a small rolling playlist, old
//! segments deleted as new ones are written, and client caching disabled.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Default segment duration in seconds
pub const DEFAULT_SEGMENT_SECS: u32 = 2;

/// Default number of segments kept in the playlist
pub const DEFAULT_LIST_SIZE: u32 = 3;

/// Builds the external converter command for one camera
pub trait Launcher: Send + Sync + 'static {
    /// Program being launched, used in launch error reports
    fn program(&self) -> &Path;

    /// Build the command. Stdio and kill-on-drop are configured by the caller.
    fn command(&self, source_uri: &str, manifest: &Path) -> Command;
}

/// ffmpeg based RTSP to HLS launcher
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    /// Path or name of the ffmpeg executable
    pub program: PathBuf,

    /// Target segment duration in seconds
    pub segment_secs: u32,

    /// Number of segments listed in the manifest
    pub list_size: u32,
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            segment_secs: DEFAULT_SEGMENT_SECS,
            list_size: DEFAULT_LIST_SIZE,
        }
    }
}

impl FfmpegLauncher {
    /// Create a launcher for a specific ffmpeg binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Set segment duration (minimum 1 second)
    pub fn segment_secs(mut self, secs: u32) -> Self {
        self.segment_secs = secs.max(1);
        self
    }

    /// Set playlist window size (minimum 1 segment)
    pub fn list_size(mut self, size: u32) -> Self {
        self.list_size = size.max(1);
        self
    }

    /// Argument list passed to ffmpeg
    pub fn args(&self, source_uri: &str, manifest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            // No `\r`-terminated progress stats on stderr
            "-nostats",
            "-loglevel",
            "info",
            "-i",
            source_uri,
            // Video / audio encoding for real-time delivery
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-preset",
            "ultrafast",
            "-tune",
            "zerolatency",
            "-f",
            "hls",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push("-hls_time".into());
        args.push(self.segment_secs.to_string().into());
        args.push("-hls_list_size".into());
        args.push(self.list_size.to_string().into());
        args.push("-hls_flags".into());
        args.push("delete_segments".into());
        args.push("-hls_allow_cache".into());
        args.push("0".into());
        args.push(manifest.as_os_str().to_os_string());

        args
    }
}

impl Launcher for FfmpegLauncher {
    fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, source_uri: &str, manifest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(source_uri, manifest));
        cmd
    }
}

/// Runs a shell snippet in place of the converter. `$1` is the manifest path.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ScriptLauncher {
    program: PathBuf,
    script: String,
}

#[cfg(test)]
impl ScriptLauncher {
    pub(crate) fn new(script: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("sh"),
            script: script.into(),
        }
    }

    /// Announces an opened input on stderr, then idles until signalled
    pub(crate) fn healthy() -> Self {
        Self::new("echo \"Input #0, rtsp, from 'rtsp://cam'\" >&2; echo 'Stream #0:0: Video: h264' >&2; exec sleep 30")
    }

    /// Never prints a readiness marker, but stays alive
    pub(crate) fn silent() -> Self {
        Self::new("exec sleep 30")
    }

    /// Fails the way an unreachable source does
    pub(crate) fn unreachable(delay_secs: f32, code: i32) -> Self {
        Self::new(format!(
            "echo 'Connection to tcp://10.0.0.99:554 failed: Connection refused' >&2; sleep {delay_secs}; exit {code}"
        ))
    }

    /// Ignores SIGTERM so termination must escalate
    pub(crate) fn stubborn() -> Self {
        Self::new("trap '' TERM; echo 'Stream #0:0: Video' >&2; while true; do sleep 0.1; done")
    }

    /// Launcher whose program does not exist
    pub(crate) fn missing() -> Self {
        Self {
            program: PathBuf::from("/nonexistent/camstream-converter"),
            script: String::new(),
        }
    }
}

#[cfg(test)]
impl Launcher for ScriptLauncher {
    fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, _source_uri: &str, manifest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c").arg(&self.script).arg("camstream-test").arg(manifest);
        cmd
    }
}
