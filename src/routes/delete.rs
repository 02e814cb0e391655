//! Object deletion
//!
//! Both routes authorize every key before touching storage, so a bulk request
//! with a single foreign key deletes nothing.

use axum::{extract::State, routing::delete, Json, Router};
use tracing::info;

use super::ApiJson;
use crate::auth::{authorize_key, authorize_keys};
use crate::middleware::AuthUser;
use crate::models::{AppState, BulkDeleteResponse, BulkKeyRequest, KeyRequest, MessageResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/delete", delete(delete_file))
        .route("/api/bulkdelete", delete(bulk_delete))
        .with_state(state)
}

/// DELETE /api/delete
async fn delete_file(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<KeyRequest>,
) -> AppResult<Json<MessageResponse>> {
    let key = request
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing object key".to_string()))?;
    authorize_key(user.email(), &key)?;

    state.storage.delete_object(&key).await?;
    info!(key = %key, "Deleted file");

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

/// DELETE /api/bulkdelete
async fn bulk_delete(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<BulkKeyRequest>,
) -> AppResult<Json<BulkDeleteResponse>> {
    let keys = request
        .key
        .filter(|keys| !keys.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("No keys provided".to_string()))?;
    authorize_keys(user.email(), &keys)?;

    state.storage.delete_objects(&keys).await?;
    info!(count = keys.len(), "Bulk deleted files");

    Ok(Json(BulkDeleteResponse {
        message: "Files deleted successfully".to_string(),
        deleted: keys.len(),
    }))
}
