use axum::{extract::State, routing::get, Json, Router};
use tracing::debug;

use crate::auth::{authorize_key, user_prefix};
use crate::middleware::AuthUser;
use crate::models::{AppState, FileEntry, FilesResponse};
use crate::storage::filename_of;
use crate::types::AppResult;

const MAX_FILES: usize = 1000;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/files", get(list_files))
        .with_state(state)
}

/// GET /api/files
async fn list_files(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<FilesResponse>> {
    let prefix = user_prefix(user.email());
    let listing = state.storage.list_objects(&prefix, MAX_FILES).await?;

    let files: Vec<FileEntry> = listing
        .objects
        .into_iter()
        .filter(|object| authorize_key(user.email(), &object.key).is_ok())
        .map(|object| FileEntry {
            filename: filename_of(&object.key).to_string(),
            key: object.key,
            size: object.size,
            last_modified: object.last_modified,
            etag: object.etag,
        })
        .collect();
    debug!(count = files.len(), truncated = listing.is_truncated, "Listed files");

    Ok(Json(FilesResponse {
        count: files.len(),
        files,
        user_email: user.email().to_string(),
    }))
}
