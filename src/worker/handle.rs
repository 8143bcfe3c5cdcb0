//! Transcoding worker handle
//!
//! Owns one converter process for one camera. A monitor task holds the
//! `Child` and multiplexes process exit, diagnostic output, manifest polling
//! and shutdown requests, reporting lifecycle changes as [`WorkerSignal`]s.
//!
//! ```text
//!   TranscodeWorker ──shutdown_tx──►  monitor task  ──signals──► supervisor
//!                                     ├ child.wait()
//!                                     ├ stderr lines ─► ReadinessProbe
//!                                     └ manifest poll ─► ReadinessProbe
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

use super::diagnostics::DiagnosticLines;
use super::launcher::Launcher;
use super::readiness::ReadinessProbe;

/// Default time a worker gets to exit after a graceful stop request
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Default manifest polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lifecycle signal emitted by a worker after spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSignal {
    /// The source was opened and a stream detected
    BecameActive,
    /// The process exited on its own. `None` if it was ended by a signal.
    Exited(Option<i32>),
    /// The process could not be waited on
    RuntimeError(String),
}

/// Timing knobs for a worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Grace period between the stop request and a forced kill
    pub termination_grace: Duration,
    /// How often the manifest file is checked until the worker is ready
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            termination_grace: DEFAULT_TERMINATION_GRACE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Handle to one running converter process
///
/// Dropping the handle without calling [`terminate`](Self::terminate) still
/// stops the process: the monitor sees the shutdown channel close and runs
/// the same graceful-then-forced sequence in the background.
#[derive(Debug)]
pub struct TranscodeWorker {
    camera_id: String,
    output_dir: PathBuf,
    manifest: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    monitor: Option<JoinHandle<()>>,
}

impl TranscodeWorker {
    /// Launch the converter for a camera
    ///
    /// Creates `output_dir` if missing. Only a failure to start the process
    /// is reported here; everything after that arrives on the returned
    /// signal receiver.
    pub async fn spawn(
        camera_id: &str,
        source_uri: &str,
        output_dir: &Path,
        manifest_name: &str,
        launcher: &dyn Launcher,
        options: WorkerOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerSignal>)> {
        tokio::fs::create_dir_all(output_dir).await?;
        let manifest = output_dir.join(manifest_name);

        let mut cmd = launcher.command(source_uri, &manifest);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| Error::Launch {
            program: launcher.program().to_path_buf(),
            source,
        })?;

        let pid = child.id();
        let stderr = child.stderr.take();

        tracing::info!(
            camera_id = %camera_id,
            pid = ?pid,
            manifest = %manifest.display(),
            "Worker spawned"
        );

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let monitor = Monitor {
            camera_id: camera_id.to_string(),
            child,
            lines: stderr.map(DiagnosticLines::new),
            readiness: ReadinessProbe::new(manifest.clone()),
            signals: signal_tx,
            options,
        };
        let monitor = tokio::spawn(monitor.run(shutdown_rx));

        let worker = Self {
            camera_id: camera_id.to_string(),
            output_dir: output_dir.to_path_buf(),
            manifest,
            shutdown_tx: Some(shutdown_tx),
            monitor: Some(monitor),
        };

        Ok((worker, signal_rx))
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// Whether the monitor (and therefore the process) is still running
    pub fn is_running(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| !m.is_finished())
    }

    /// Stop the process and wait until it is gone
    ///
    /// Sends a graceful stop request, escalating to a forced kill after the
    /// grace period. Calling this on an exited or already-terminated worker
    /// is a no-op.
    pub async fn terminate(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            // Err means the monitor already finished
            let _ = tx.send(());
        }

        if let Some(monitor) = self.monitor.take() {
            if let Err(e) = monitor.await {
                tracing::warn!(camera_id = %self.camera_id, error = %e, "Worker monitor panicked");
            }
        }
    }

    /// Remove the manifest and every segment for this camera
    pub async fn remove_artifacts(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.output_dir).await {
            Ok(()) => {
                tracing::debug!(
                    camera_id = %self.camera_id,
                    dir = %self.output_dir.display(),
                    "Output artifacts removed"
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// State owned by the monitor task
struct Monitor {
    camera_id: String,
    child: Child,
    lines: Option<DiagnosticLines<ChildStderr>>,
    readiness: ReadinessProbe,
    signals: mpsc::UnboundedSender<WorkerSignal>,
    options: WorkerOptions,
}

impl Monitor {
    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                status = self.child.wait() => {
                    match status {
                        Ok(status) => {
                            tracing::info!(
                                camera_id = %self.camera_id,
                                code = ?status.code(),
                                "Worker exited"
                            );
                            let _ = self.signals.send(WorkerSignal::Exited(status.code()));
                        }
                        Err(e) => {
                            tracing::error!(camera_id = %self.camera_id, error = %e, "Worker wait failed");
                            let _ = self.signals.send(WorkerSignal::RuntimeError(e.to_string()));
                        }
                    }
                    return;
                }
                line = next_line(&mut self.lines) => {
                    match line {
                        Ok(Some(line)) => {
                            tracing::trace!(camera_id = %self.camera_id, "{}", line);
                            if self.readiness.observe_line(&line) {
                                self.mark_active("diagnostic output");
                            }
                        }
                        // stderr closed; keep waiting on the process
                        Ok(None) => self.lines = None,
                        Err(e) => {
                            tracing::warn!(
                                camera_id = %self.camera_id,
                                error = %e,
                                "Diagnostic output unreadable"
                            );
                            self.lines = None;
                        }
                    }
                }
                _ = ticker.tick(), if !self.readiness.is_ready() => {
                    if self.readiness.probe_manifest().await {
                        self.mark_active("manifest present");
                    }
                }
                _ = &mut shutdown_rx => {
                    self.shutdown().await;
                    return;
                }
            }
        }
    }

    fn mark_active(&self, via: &str) {
        tracing::info!(camera_id = %self.camera_id, via = via, "Worker became active");
        let _ = self.signals.send(WorkerSignal::BecameActive);
    }

    async fn shutdown(&mut self) {
        request_stop(&mut self.child);

        match tokio::time::timeout(self.options.termination_grace, self.child.wait()).await {
            Ok(status) => {
                tracing::info!(
                    camera_id = %self.camera_id,
                    code = ?status.ok().and_then(|s| s.code()),
                    "Worker terminated"
                );
            }
            Err(_) => {
                tracing::warn!(
                    camera_id = %self.camera_id,
                    grace_ms = self.options.termination_grace.as_millis() as u64,
                    "Worker ignored stop request, killing"
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(camera_id = %self.camera_id, error = %e, "Forced kill failed");
                }
            }
        }
    }
}

async fn next_line(
    lines: &mut Option<DiagnosticLines<ChildStderr>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

/// Ask the process to exit (SIGTERM on unix)
#[cfg(unix)]
fn request_stop(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain kill(2) on a pid we spawned and have not yet reaped
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            let _ = child.start_kill();
        }
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::worker::launcher::ScriptLauncher;

    fn fast_options() -> WorkerOptions {
        WorkerOptions {
            termination_grace: Duration::from_millis(300),
            poll_interval: Duration::from_millis(50),
        }
    }

    async fn next_signal(rx: &mut mpsc::UnboundedReceiver<WorkerSignal>) -> Option<WorkerSignal> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_launch_failure_is_synchronous() {
        let dir = tempfile::tempdir().unwrap();
        let result = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &dir.path().join("cam-1"),
            "stream.m3u8",
            &ScriptLauncher::missing(),
            fast_options(),
        )
        .await;

        assert!(matches!(result, Err(Error::Launch { .. })));
    }

    #[tokio::test]
    async fn test_spawn_creates_output_dir_and_becomes_active() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cam-1");

        let (mut worker, mut rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &out,
            "stream.m3u8",
            &ScriptLauncher::healthy(),
            fast_options(),
        )
        .await
        .unwrap();

        assert!(out.is_dir());
        assert_eq!(worker.manifest(), out.join("stream.m3u8"));
        assert_eq!(next_signal(&mut rx).await, Some(WorkerSignal::BecameActive));
        assert!(worker.is_running());

        worker.terminate().await;
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_manifest_probe_activates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cam-1");

        let (mut worker, mut rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &out,
            "stream.m3u8",
            &ScriptLauncher::new("sleep 0.2; echo '#EXTM3U' > \"$1\"; exec sleep 30"),
            fast_options(),
        )
        .await
        .unwrap();

        assert_eq!(next_signal(&mut rx).await, Some(WorkerSignal::BecameActive));
        worker.terminate().await;
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let dir = tempfile::tempdir().unwrap();

        let (_worker, mut rx) = TranscodeWorker::spawn(
            "cam-2",
            "rtsp://unreachable",
            &dir.path().join("cam-2"),
            "stream.m3u8",
            &ScriptLauncher::unreachable(0.0, 1),
            fast_options(),
        )
        .await
        .unwrap();

        assert_eq!(next_signal(&mut rx).await, Some(WorkerSignal::Exited(Some(1))));
        // Nothing follows the exit
        assert_eq!(next_signal(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_non_utf8_diagnostics_keep_worker_alive() {
        let dir = tempfile::tempdir().unwrap();
        let script = "echo 'Stream #0:0: Video: h264' >&2; printf 'title: Caf\\351\\n' >&2; \
                      while true; do echo 'frame=1' >&2; sleep 0.05; done";

        let (mut worker, mut rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &dir.path().join("cam-1"),
            "stream.m3u8",
            &ScriptLauncher::new(script),
            fast_options(),
        )
        .await
        .unwrap();

        assert_eq!(next_signal(&mut rx).await, Some(WorkerSignal::BecameActive));

        let quiet = tokio::time::timeout(Duration::from_millis(1500), rx.recv()).await;
        assert!(quiet.is_err(), "unexpected signal: {:?}", quiet);
        assert!(worker.is_running());

        worker.terminate().await;
    }

    #[tokio::test]
    async fn test_carriage_return_progress_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let script = "printf 'frame=  1 fps=0.0\\r' >&2; printf 'Stream #0:0: Video: h264\\r' >&2; \
                      while true; do printf 'frame=  2 fps=25 q=-1.0 size=N/A\\r' >&2; sleep 0.01; done";

        let (mut worker, mut rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &dir.path().join("cam-1"),
            "stream.m3u8",
            &ScriptLauncher::new(script),
            fast_options(),
        )
        .await
        .unwrap();

        assert_eq!(next_signal(&mut rx).await, Some(WorkerSignal::BecameActive));

        let quiet = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(quiet.is_err(), "unexpected signal: {:?}", quiet);
        assert!(worker.is_running());

        worker.terminate().await;
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();

        let (mut worker, _rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &dir.path().join("cam-1"),
            "stream.m3u8",
            &ScriptLauncher::silent(),
            fast_options(),
        )
        .await
        .unwrap();

        worker.terminate().await;
        worker.terminate().await;
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        let dir = tempfile::tempdir().unwrap();

        let (mut worker, mut rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &dir.path().join("cam-1"),
            "stream.m3u8",
            &ScriptLauncher::stubborn(),
            fast_options(),
        )
        .await
        .unwrap();
        assert_eq!(next_signal(&mut rx).await, Some(WorkerSignal::BecameActive));

        let started = Instant::now();
        worker.terminate().await;

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_remove_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cam-1");

        let (mut worker, _rx) = TranscodeWorker::spawn(
            "cam-1",
            "rtsp://cam",
            &out,
            "stream.m3u8",
            &ScriptLauncher::silent(),
            fast_options(),
        )
        .await
        .unwrap();

        tokio::fs::write(out.join("stream.m3u8"), b"#EXTM3U\n").await.unwrap();
        tokio::fs::write(out.join("stream0.ts"), b"segment").await.unwrap();

        worker.terminate().await;
        worker.remove_artifacts().await.unwrap();
        assert!(!out.exists());

        // Second removal is fine
        worker.remove_artifacts().await.unwrap();
    }
}
