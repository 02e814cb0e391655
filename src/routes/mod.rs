//! API Routes
//!
//! - `/api/register`, `/api/auth/*` - Accounts and sessions
//! - `/api/upload` - Presigned/direct upload, listing, proxied download
//! - `/api/download` - Presigned download URLs
//! - `/api/delete`, `/api/bulkdelete` - Object deletion
//! - `/api/files` - The caller's files
//! - `/api/health` - Health checks
//! - `/` - Static file serving (frontend)

pub mod auth;
pub mod delete;
pub mod download;
pub mod extract;
pub mod files;
pub mod health;
pub mod static_files;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use crate::middleware::cors_layer;
use crate::models::AppState;
use tracing::info;

pub use extract::ApiJson;

/// Create the main application router
///
/// API routes take precedence over static files.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let static_dir = state.config.server.static_dir.clone();
    let allowed_origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(auth::router(state.clone()))
        .merge(upload::router(state.clone()))
        .merge(download::router(state.clone()))
        .merge(delete::router(state.clone()))
        .merge(files::router(state.clone()))
        .merge(health::router(state));

    Router::new()
        .merge(api_router)
        .merge(static_files::router(&static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&allowed_origins)),
        )
}
