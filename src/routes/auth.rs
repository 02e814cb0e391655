//! Account routes
//!
//! - `POST /api/register` - create an account
//! - `POST /api/auth/login` - exchange credentials for a session cookie
//! - `POST /api/auth/logout` - clear the session cookie
//! - `GET /api/auth/session` - describe the current session

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use super::ApiJson;
use crate::auth::{hash_password, verify_password};
use crate::middleware::{clear_session_cookie, session_cookie, AuthUser};
use crate::models::{
    AppState, LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, SessionResponse,
    SessionUser,
};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(current_session))
        .with_state(state)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

async fn hash_in_background(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_in_background(password: String, password_hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
}

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    ApiJson(mut request): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    request.email = normalize_email(&request.email);
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(validation_message(&e)))?;

    if let Some(confirm) = &request.confirm_password {
        if *confirm != request.password {
            return Err(AppError::InvalidRequest("Passwords do not match".to_string()));
        }
    }

    if state.users.find_by_email(&request.email).await?.is_some() {
        return Err(AppError::InvalidRequest("Email already in use".to_string()));
    }

    let password_hash = hash_in_background(request.password).await?;
    let user = state.users.create_user(&request.email, &password_hash).await?;
    info!(user_id = %user.id, "Registered new user");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.email,
            message: "User created successfully".to_string(),
        }),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let invalid = || AppError::Auth("Invalid email or password".to_string());

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(invalid());
    }
    if let Some(confirm) = &request.confirm_password {
        if *confirm != request.password {
            return Err(invalid());
        }
    }

    let user = state.users.find_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_in_background(request.password, user.password.clone()).await? {
        warn!(user_id = %user.id, "Rejected login with wrong password");
        return Err(invalid());
    }

    let session = state.sessions.issue(user.id, &user.email)?;
    let cookie = session_cookie(&state.config.auth, &session.token, state.sessions.ttl_secs());
    info!(user_id = %user.id, "Issued session");

    let body = SessionResponse {
        user: SessionUser {
            id: user.id,
            email: user.email,
        },
        expires_at: session.expires_at,
        token: Some(session.token),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    )
        .into_response()
}

/// GET /api/auth/session
async fn current_session(user: AuthUser) -> AppResult<Json<SessionResponse>> {
    Ok(Json(SessionResponse {
        user: SessionUser {
            id: user.claims.user_id()?,
            email: user.claims.email.clone(),
        },
        expires_at: user.claims.expires_at(),
        token: None,
    }))
}
