use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::warn;

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, storage) = tokio::join!(state.users.ping(), state.storage.ping());

    let database = match database {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            "unavailable".to_string()
        }
    };
    let storage = match storage {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            warn!(error = %e, "Storage health check failed");
            "unavailable".to_string()
        }
    };

    let healthy = database == "connected" && storage == "connected";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            database,
            storage,
        }),
    )
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_without_session() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["storage"], "connected");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_storage_outage_degrades_health() {
        let app = TestApp::new();
        app.storage.set_offline(true);

        let (status, body) = app.get("/api/health", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "connected");
        assert_eq!(body["storage"], "unavailable");
    }

    #[tokio::test]
    async fn test_database_outage_degrades_health() {
        let app = TestApp::new();
        app.users.set_offline(true);

        let (status, body) = app.get("/api/health", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "unavailable");
        assert_eq!(body["storage"], "connected");
    }
}
