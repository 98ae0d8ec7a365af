// ============================
// studyroom-backend-lib/src/auth/extractor.rs
// ============================
//! Bearer-token extractor for protected handlers.
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;

use super::UserIdentity;
use crate::error::AppError;
use crate::AppState;

/// The caller behind `Authorization: Bearer <token>`
#[derive(Clone, Debug)]
pub struct AuthUser(pub UserIdentity);

/// Token from an `Authorization: Bearer` header, if well formed
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::warn!(path = %parts.uri.path(), "missing or malformed Authorization header");
            AppError::Unauthenticated
        })?;

        let identity = state.auth.resolve(token).await.inspect_err(|_| {
            tracing::warn!(path = %parts.uri.path(), "rejected bearer token");
        })?;
        Ok(AuthUser(identity))
    }
}
