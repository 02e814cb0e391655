// Presigned download URLs

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use super::ApiJson;
use crate::auth::authorize_key;
use crate::middleware::AuthUser;
use crate::models::{AppState, KeyRequest, PresignedUrlResponse};
use crate::storage::{filename_of, DOWNLOAD_URL_EXPIRY_SECS};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", post(presign_download))
        .with_state(state)
}

/// POST /api/download
async fn presign_download(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<KeyRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    let key = request
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing object key".to_string()))?;
    authorize_key(user.email(), &key)?;

    let url = state
        .storage
        .presign_get(&key, filename_of(&key), DOWNLOAD_URL_EXPIRY_SECS)
        .await?;
    info!(key = %key, "Issued presigned download URL");

    Ok(Json(PresignedUrlResponse { url, key: None }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_presigned_download_for_own_key() {
        let app = TestApp::new();
        let token = app.login_as("a@x.com").await;

        let (status, body) = app
            .post_json(
                "/api/download",
                json!({"key": "uploads/a@x.com/123/report.pdf"}),
                Some(&token),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        let url = body["url"].as_str().unwrap();
        assert!(url.contains("X-Amz-Method=GET"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(body.get("key").is_none());
    }

    #[tokio::test]
    async fn test_presigned_download_rejections() {
        let app = TestApp::new();
        let token = app.login_as("a@x.com").await;

        let (status, _) = app
            .post_json("/api/download", json!({"key": "uploads/a@x.com/1/f"}), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.post_json("/api/download", json!({}), Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing object key");

        let (status, _) = app
            .post_json("/api/download", json!({"key": ""}), Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post_json(
                "/api/download",
                json!({"key": "uploads/b@x.com/123/report.pdf"}),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_presigned_download_rejects_dot_segments() {
        let app = TestApp::new();
        let token = app.login_as("a@x.com").await;

        for key in [
            "uploads/a@x.com/../b@x.com/123/report.pdf",
            "uploads/a@x.com/./report.pdf",
            "uploads/a@x.com//report.pdf",
        ] {
            let (status, body) = app
                .post_json("/api/download", json!({"key": key}), Some(&token))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", key);
            assert!(body.get("url").is_none());
        }
    }
}
