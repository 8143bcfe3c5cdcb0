//! HTTP server listener
//!
//! Binds the API, WebSocket and segment routes and stops every stream when
//! the server shuts down.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::cameras::{CameraStore, MemoryCameraStore};
use crate::error::Result;
use crate::hub::RealtimeHub;
use crate::server::config::ServerConfig;
use crate::server::routes::create_router;
use crate::server::state::AppState;
use crate::supervisor::StreamSupervisor;
use crate::worker::FfmpegLauncher;

/// HTTP and WebSocket server
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    /// Build the server and its components from `config`
    ///
    /// Loads the camera list when `cameras_file` is set.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let cameras: Arc<dyn CameraStore> = match &config.cameras_file {
            Some(path) => Arc::new(MemoryCameraStore::from_json_file(path).await?),
            None => Arc::new(MemoryCameraStore::new()),
        };

        let hub = Arc::new(RealtimeHub::with_buffer(config.observer_buffer));
        let supervisor = Arc::new(StreamSupervisor::new(
            config.supervisor.clone(),
            Arc::new(FfmpegLauncher::with_program(&config.ffmpeg_program)),
            Arc::clone(hub.subscriptions()),
        ));

        Ok(Self::with_state(config, AppState::new(supervisor, hub, cameras)))
    }

    /// Create a server around existing components
    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Full application router
    pub fn router(&self) -> Router {
        let supervisor = &self.config.supervisor;
        let mut router = create_router(self.state.clone())
            .nest_service(&supervisor.public_prefix, ServeDir::new(&supervisor.output_root));

        if let Some(dir) = &self.config.static_dir {
            let serve_dir = ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")));
            router = router.fallback_service(serve_dir);
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves, then stop every stream
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "HTTP server listening");

        let server = axum::serve(listener, self.router()).into_future();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = server => result.map_err(Into::into),
        };

        self.state.supervisor.stop_all().await;
        tracing::info!("HTTP server stopped");

        result
    }
}
