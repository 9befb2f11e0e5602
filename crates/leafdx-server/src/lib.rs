//! HTTP boundary: axum routes over a shared [`DiagnosisService`].

mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use leafdx_ai::DiagnosisService;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, NO_FILE_SELECTED, status_for};
pub use routes::{HealthResponse, SharedService};

/// Largest accepted request body unless configured otherwise (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_upload_bytes: usize,
}

/// Build the application router.
pub fn router(service: SharedService, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/labels", get(routes::labels))
        .route("/predict", post(routes::predict))
        .with_state(service)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Bind `config.addr` and serve until the process is stopped.
pub async fn serve(service: DiagnosisService, config: &ServerConfig) -> std::io::Result<()> {
    let app = router(Arc::new(service), config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await
}
