//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hub::DEFAULT_OBSERVER_BUFFER;
use crate::supervisor::SupervisorConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Outbound queue size of each WebSocket observer
    pub observer_buffer: usize,

    /// Dashboard assets served for unmatched paths, if any
    pub static_dir: Option<PathBuf>,

    /// Converter executable
    pub ffmpeg_program: PathBuf,

    /// JSON camera list loaded at startup
    pub cameras_file: Option<PathBuf>,

    /// Stream supervisor settings; its output root is served under
    /// its public prefix
    pub supervisor: SupervisorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
            static_dir: None,
            ffmpeg_program: PathBuf::from("ffmpeg"),
            cameras_file: None,
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read overrides from the process environment
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from a variable lookup
    ///
    /// Recognized keys: `CAMSTREAM_BIND`, `CAMSTREAM_OUTPUT_ROOT`,
    /// `CAMSTREAM_FFMPEG`, `CAMSTREAM_CAMERAS`, `CAMSTREAM_STATIC_DIR`,
    /// `CAMSTREAM_OBSERVER_BUFFER`, `CAMSTREAM_OBSERVATION_MS`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("CAMSTREAM_BIND") {
            config.bind_addr = addr
                .parse()
                .map_err(|_| Error::Config(format!("CAMSTREAM_BIND: invalid address {:?}", addr)))?;
        }
        if let Some(root) = lookup("CAMSTREAM_OUTPUT_ROOT") {
            config.supervisor = config.supervisor.output_root(root);
        }
        if let Some(program) = lookup("CAMSTREAM_FFMPEG") {
            config.ffmpeg_program = PathBuf::from(program);
        }
        if let Some(path) = lookup("CAMSTREAM_CAMERAS") {
            config.cameras_file = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("CAMSTREAM_STATIC_DIR") {
            config.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = lookup("CAMSTREAM_OBSERVER_BUFFER") {
            let size = parse_number("CAMSTREAM_OBSERVER_BUFFER", &size)?;
            config = config.observer_buffer(size as usize);
        }
        if let Some(ms) = lookup("CAMSTREAM_OBSERVATION_MS") {
            let ms = parse_number("CAMSTREAM_OBSERVATION_MS", &ms)?;
            config.supervisor = config
                .supervisor
                .observation_window(Duration::from_millis(ms));
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the per-observer queue size (at least 1)
    pub fn observer_buffer(mut self, size: usize) -> Self {
        self.observer_buffer = size.max(1);
        self
    }

    /// Serve dashboard assets from `dir`
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Set the converter executable
    pub fn ffmpeg_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg_program = program.into();
        self
    }

    /// Set supervisor options
    pub fn supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{}: expected a number, got {:?}", key, value)))
}
