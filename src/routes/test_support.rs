// Router-level test harness backed by the in-memory stores

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use super::create_router;
use crate::auth::hash_password;
use crate::config::Config;
use crate::db::{MemoryUserStore, UserStore};
use crate::models::AppState;
use crate::storage::MemoryStore;

pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub storage: Arc<MemoryStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::for_tests())
    }

    pub fn with_config(config: Config) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let storage = Arc::new(MemoryStore::new(&config.storage.bucket));
        let state = AppState::new(config, users.clone(), storage.clone());
        let router = create_router(state.clone());

        Self {
            state,
            users,
            storage,
            router,
        }
    }

    pub async fn register(&self, email: &str, password: &str) {
        let hash = hash_password(password).unwrap();
        self.users.create_user(email, &hash).await.unwrap();
    }

    /// Create the user and return a bearer token for it.
    pub async fn login_as(&self, email: &str) -> String {
        self.register(email, "password123").await;
        let user = self.users.find_by_email(email).await.unwrap().unwrap();
        self.state.sessions.issue(user.id, email).unwrap().token
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send_json(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send_json(json_request("POST", uri, body, token)).await
    }

    pub async fn delete_json(
        &self,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        self.send_json(json_request("DELETE", uri, body, token)).await
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }
}
