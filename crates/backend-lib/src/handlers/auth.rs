// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Registration, login and current-user endpoints.
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use studyroom_common::{LoginRequest, RegisterRequest, TokenResponse, UserResponse};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::handlers::AppJson;
use crate::AppState;

/// `POST /api/v1/auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/v1/auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    Ok(Json(state.auth.login(req).await?))
}

/// `GET /api/v1/auth/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    state
        .users
        .get(identity.user_id)
        .map(|user| Json(user.to_response()))
        .ok_or_else(|| AppError::NotFound(format!("user {}", identity.user_id)))
}
