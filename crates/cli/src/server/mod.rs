//! HTTP frontend for the local variant: `POST /decompile` and `POST /translate`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use recode_core::services::decompiler::Decompiler;
use recode_core::services::generation::TextGenerator;
use recode_core::workspace::WorkspaceLayout;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;

pub use error::ApiError;

/// Shared handler state. Cloned per request; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub decompiler: Arc<dyn Decompiler>,
    pub generator: Arc<dyn TextGenerator>,
    pub layout: Arc<WorkspaceLayout>,
}

impl AppState {
    pub fn new(
        decompiler: Arc<dyn Decompiler>,
        generator: Arc<dyn TextGenerator>,
        layout: WorkspaceLayout,
    ) -> Self {
        Self { decompiler, generator, layout: Arc::new(layout) }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/decompile", post(handlers::decompile))
        .route("/translate", post(handlers::translate))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve `router` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
