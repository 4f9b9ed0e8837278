//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/upload-zip` - Upload two document archives and a signature image
//! - `/download/{folder_name}` - Download a job's signed documents
//! - `/api/health` - Health checks

pub mod files;
pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let body_limit = state.config.server.max_upload_bytes;
    let origins = state.config.server.cors_allowed_origins.clone();

    let router = Router::new()
        .merge(files::router(state))
        .merge(health::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    apply_cors(router, &origins)
}
