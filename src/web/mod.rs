//! HTTP front end.
//!
//! - `GET /` - upload form
//! - `POST /preview` - parse a file and show the preview
//! - `POST /upload` - upload a previewed batch
//! - `POST /api/upload` - parse and upload in one request, JSON response
//! - `GET /api/health` - liveness

pub mod page;
pub mod pending;
pub mod routes;

use crate::core::uploader::UploadOrchestrator;
use crate::domain::ports::DocumentStore;
use crate::utils::error::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use pending::PendingBatches;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared by every request. The store handle inside the orchestrator is
/// built once at startup.
pub struct AppState<S: DocumentStore> {
    pub orchestrator: Arc<UploadOrchestrator<S>>,
    pub pending: Arc<PendingBatches>,
    pub database_url: Arc<str>,
    pub preview_rows: usize,
    pub max_upload_bytes: usize,
}

impl<S: DocumentStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            pending: Arc::clone(&self.pending),
            database_url: Arc::clone(&self.database_url),
            preview_rows: self.preview_rows,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

impl<S: DocumentStore> AppState<S> {
    pub fn new(
        store: S,
        database_url: &str,
        preview_rows: usize,
        max_upload_bytes: usize,
        pending_ttl: Duration,
    ) -> Self {
        Self {
            orchestrator: Arc::new(UploadOrchestrator::new(store)),
            pending: Arc::new(PendingBatches::new(pending_ttl)),
            database_url: Arc::from(database_url),
            preview_rows,
            max_upload_bytes,
        }
    }
}

pub fn create_router<S: DocumentStore + 'static>(state: AppState<S>) -> Router {
    tracing::debug!("Creating application router");

    Router::new()
        .route("/", get(routes::index::<S>))
        .route("/preview", post(routes::preview::<S>))
        .route("/upload", post(routes::upload::<S>))
        .route("/api/upload", post(routes::api_upload::<S>))
        .route("/api/health", get(routes::health))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<S: DocumentStore + 'static>(addr: SocketAddr, state: AppState<S>) -> Result<()> {
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
