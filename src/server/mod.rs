//! HTTP server module
//!
//! Binds the configured address and serves the upload API. The accept loop
//! is plain `hyper` (one task per connection); routing, multipart parsing and
//! CORS come from an `axum` router adapted to hyper's service trait.
//!
//! # Endpoints
//!
//! * `GET /` - service descriptor
//! * `GET /health` - liveness check
//! * `POST /api/get-upload-url` - multipart `file` + `type`, returns a presigned PUT URL
//! * `GET /ui` - upload form
//! * `GET /metrics` - Prometheus exposition (when enabled)

use crate::config::{Config, ServerConfig};
use crate::s3::ObjectStore;
use crate::upload::UploadService;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod handlers;

pub use handlers::AppState;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// Build the application router
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app: Router<Arc<AppState>> = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/ui", get(handlers::upload_page))
        .route("/api/get-upload-url", post(handlers::get_upload_url));

    #[cfg(feature = "metrics")]
    if state.metrics_enabled {
        app = app.route("/metrics", get(handlers::metrics_text));
    }

    app = app
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if config.cors_allow_any_origin {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers(Any),
        );
    }

    app.with_state(state)
}

/// Upload service HTTP server
pub struct Server {
    app: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the configured address. Port 0 lets the OS pick one.
    pub async fn new(config: &Config, store: Arc<dyn ObjectStore>) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        let state = Arc::new(AppState {
            uploads: UploadService::from_config(store, config),
            max_upload_bytes: config.server.max_upload_bytes,
            metrics_enabled: config.metrics.enabled,
        });

        Ok(Self {
            app: router(state, &config.server),
            listener,
            local_addr,
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is dropped.
    ///
    /// Connection errors are logged and do not stop the loop.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Upload service listening on {}", self.local_addr);

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let service = TowerToHyperService::new(self.app.clone());

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}
