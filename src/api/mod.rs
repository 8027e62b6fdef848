//! Status overlay server
//!
//! Serves the overlay page, relays assistant events to websocket clients,
//! and exposes the resolver and application index for inspection.

pub mod health;
pub mod index;
pub mod websocket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::events::EventBus;
use crate::resolve::TargetResolver;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Event broadcaster shared with the assistant
    pub events: EventBus,
    /// Target resolver shared with the assistant
    pub resolver: Arc<TargetResolver>,
}

/// Overlay HTTP server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Create a server
    #[must_use]
    pub fn new(state: ApiState, port: u16, static_dir: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(state),
            port,
            static_dir,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api", index::router(self.state.clone()))
            .merge(websocket::router(self.state.clone()))
            .merge(health::router());

        // Overlay page at `/`, assets under `/ui`
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            router = router
                .route_service("/", ServeFile::new(&index_file))
                .nest_service("/ui", ServeDir::new(static_dir));
            tracing::info!(path = %static_dir.display(), "serving overlay files");
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the server until it fails
    ///
    /// # Errors
    ///
    /// Returns error if the port can't be bound or the server fails
    pub async fn run(self) -> Result<()> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Api(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(url = %format!("http://{addr}"), "overlay server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Api(format!("overlay server error: {e}")))
    }

    /// Run the server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
