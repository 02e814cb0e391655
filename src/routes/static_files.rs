//! Static File Serving
//!
//! Serves a built frontend from the configured static directory. When no
//! build is present, `/` answers with a small landing page describing the API.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Create router for serving static files
pub fn router(static_dir: &str) -> Router {
    let static_dir = PathBuf::from(static_dir);
    if static_dir.is_dir() {
        info!(path = %static_dir.display(), "Serving static files");
    } else {
        warn!(path = %static_dir.display(), "Static files directory not found, serving landing page only");
    }

    let serve_dir = ServeDir::new(&static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(serve_index))
        .fallback_service(serve_dir)
        .with_state(Arc::new(static_dir))
}

async fn serve_index(State(static_dir): State<Arc<PathBuf>>) -> Response {
    if let Ok(content) = tokio::fs::read_to_string(static_dir.join("index.html")).await {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            content,
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        LANDING_PAGE,
    )
        .into_response()
}

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>r2-filebox</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 760px;
            margin: 0 auto;
            padding: 40px 20px;
            background: #0f172a;
            color: #e2e8f0;
        }
        h1 { color: #38bdf8; }
        code { background: #1e293b; padding: 2px 6px; border-radius: 4px; color: #7dd3fc; }
        li { margin: 6px 0; }
    </style>
</head>
<body>
    <h1>r2-filebox</h1>
    <p>Per-user file storage on Cloudflare R2. Place a built frontend in the static directory to serve it here.</p>
    <h3>API</h3>
    <ul>
        <li><code>POST /api/register</code> create an account</li>
        <li><code>POST /api/auth/login</code> / <code>POST /api/auth/logout</code></li>
        <li><code>POST /api/upload</code> presigned PUT (JSON) or direct upload (multipart)</li>
        <li><code>GET /api/upload?prefix=&amp;limit=</code> list objects</li>
        <li><code>GET /api/upload/download?key=</code> download through the server</li>
        <li><code>POST /api/download</code> presigned GET</li>
        <li><code>DELETE /api/delete</code> / <code>DELETE /api/bulkdelete</code></li>
        <li><code>GET /api/files</code> list your files</li>
        <li><code>GET /api/health</code> health check</li>
    </ul>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_landing_page_without_build() {
        let (status, body) = get_body(router("/nonexistent/static/dir"), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("POST /api/upload"));
    }

    #[tokio::test]
    async fn test_serves_built_frontend() {
        let dir = std::env::temp_dir().join(format!("r2-filebox-static-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>app</h1>").unwrap();
        std::fs::write(dir.join("app.js"), "console.log(1)").unwrap();

        let static_dir = dir.to_string_lossy().to_string();
        let (status, body) = get_body(router(&static_dir), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>app</h1>");

        let (status, body) = get_body(router(&static_dir), "/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1)");

        let (status, _) = get_body(router(&static_dir), "/missing.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&dir).ok();
    }
}
