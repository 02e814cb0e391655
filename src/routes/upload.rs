//! Upload routes
//!
//! `POST /api/upload` accepts either a JSON `{filename, contentType}` body and
//! answers with a presigned PUT URL, or a multipart form `{file, prefix}` whose
//! bytes are stored through the server. Both write below the caller's
//! `uploads/{email}/` namespace.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::ApiJson;
use crate::auth::{authorize_key, scoped_key, user_prefix};
use crate::middleware::AuthUser;
use crate::models::{
    AppState, DeletedKeyResponse, DirectUploadResponse, KeyRequest, ListQuery, ListResponse,
    ListedObject, PresignUploadRequest, PresignedUrlResponse,
};
use crate::storage::{
    attachment_disposition, filename_of, UploadMetadata, UPLOAD_URL_EXPIRY_SECS,
};
use crate::types::{AppError, AppResult};

const DEFAULT_LIST_LIMIT: usize = 25;
const MAX_LIST_LIMIT: usize = 100;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route(
            "/api/upload",
            post(upload).get(list_objects).delete(delete_object),
        )
        .route("/api/upload/download", get(download_object))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// `limit` query parameter: default 25, clamped to 1..=100.
pub(crate) fn clamp_limit(raw: Option<&str>) -> usize {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => DEFAULT_LIST_LIMIT,
        Some(raw) => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => n.clamp(1.0, MAX_LIST_LIMIT as f64) as usize,
            _ => DEFAULT_LIST_LIMIT,
        },
    }
}

/// Listing prefix, defaulting to the caller's namespace and never leaving it.
pub(crate) fn resolve_list_prefix(email: &str, requested: Option<&str>) -> AppResult<String> {
    match requested.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(user_prefix(email)),
        Some(prefix) => {
            authorize_key(email, prefix)?;
            Ok(prefix.to_string())
        }
    }
}

fn is_multipart(content_type: &mime::Mime) -> bool {
    content_type.type_() == mime::MULTIPART && content_type.subtype() == mime::FORM_DATA
}

fn is_json(content_type: &mime::Mime) -> bool {
    content_type.subtype() == mime::JSON || content_type.suffix() == Some(mime::JSON)
}

/// POST /api/upload
async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    request: Request,
) -> AppResult<Response> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok());

    match content_type {
        Some(ct) if is_multipart(&ct) => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| AppError::rejected_body(e.status(), e.body_text()))?;
            let response = direct_upload(&state, &user, multipart).await?;
            Ok(Json(response).into_response())
        }
        Some(ct) if is_json(&ct) => {
            let ApiJson(body) = ApiJson::<PresignUploadRequest>::from_request(request, &state).await?;
            let response = presign_upload(&state, &user, body).await?;
            Ok(Json(response).into_response())
        }
        _ => Err(AppError::InvalidRequest(
            "Expected a JSON body or multipart form data".to_string(),
        )),
    }
}

async fn presign_upload(
    state: &AppState,
    user: &AuthUser,
    request: PresignUploadRequest,
) -> AppResult<PresignedUrlResponse> {
    let filename = request
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("filename is required".to_string()))?;
    let content_type = request
        .content_type
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("contentType is required".to_string()))?;
    content_type
        .parse::<mime::Mime>()
        .map_err(|_| AppError::InvalidRequest(format!("Invalid content type: {}", content_type)))?;

    let key = scoped_key(user.email(), &Uuid::new_v4().to_string(), &filename)?;
    authorize_key(user.email(), &key)?;

    let url = state
        .storage
        .presign_put(&key, UPLOAD_URL_EXPIRY_SECS)
        .await?;
    info!(key = %key, content_type = %content_type, "Issued presigned upload URL");

    Ok(PresignedUrlResponse { url, key: Some(key) })
}

async fn direct_upload(
    state: &AppState,
    user: &AuthUser,
    mut multipart: Multipart,
) -> AppResult<DirectUploadResponse> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut prefix = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::rejected_body(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::rejected_body(e.status(), e.body_text()))?;
                file = Some((filename, content_type, data));
            }
            "prefix" => {
                prefix = field
                    .text()
                    .await
                    .map_err(|e| AppError::rejected_body(e.status(), e.body_text()))?;
            }
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::InvalidRequest("No file was provided".to_string()))?;

    let key = scoped_key(user.email(), &prefix, &filename)?;
    authorize_key(user.email(), &key)?;

    let content_type = content_type
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(filename_of(&key))
                .first_or_octet_stream()
                .to_string()
        });
    let metadata = UploadMetadata {
        uploader: user.email().to_string(),
        uploaded_at: Utc::now(),
    };

    let size = data.len();
    state
        .storage
        .put_object(&key, data, &content_type, &metadata)
        .await?;
    info!(key = %key, size, "Uploaded object through the server");

    Ok(DirectUploadResponse {
        success: true,
        key,
        bucket: state.storage.bucket().to_string(),
    })
}

/// GET /api/upload?prefix=&limit=
async fn list_objects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let prefix = resolve_list_prefix(user.email(), query.prefix.as_deref())?;
    let limit = clamp_limit(query.limit.as_deref());

    let listing = state.storage.list_objects(&prefix, limit).await?;
    let items = listing
        .objects
        .into_iter()
        .filter(|object| authorize_key(user.email(), &object.key).is_ok())
        .take(limit)
        .map(|object| ListedObject {
            key: object.key,
            size: object.size,
            last_modified: object.last_modified,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        is_truncated: listing.is_truncated,
    }))
}

/// DELETE /api/upload
async fn delete_object(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<KeyRequest>,
) -> AppResult<Json<DeletedKeyResponse>> {
    let key = request
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing object key".to_string()))?;
    authorize_key(user.email(), &key)?;

    state.storage.delete_object(&key).await?;
    info!(key = %key, "Deleted object");

    Ok(Json(DeletedKeyResponse { success: true, key }))
}

/// GET /api/upload/download?key=
async fn download_object(
    State(state): State<AppState>,
    user: AuthUser,
    Query(request): Query<KeyRequest>,
) -> AppResult<Response> {
    let key = request
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Missing object key".to_string()))?;
    authorize_key(user.email(), &key)?;

    let object = state.storage.get_object(&key).await?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    let mut response = Body::from_stream(object.stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, header_value(&content_type)?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&attachment_disposition(filename_of(&key)))?,
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=0, must-revalidate"),
    );
    if let Some(length) = object.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::Internal(format!("Invalid header value: {}", value)))
}
