// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP and WebSocket handlers.
use axum::{
    extract::{FromRequest, FromRequestParts, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::AppState;

pub mod auth;
pub mod live;
pub mod rooms;

/// JSON request body whose rejection renders as an [`AppError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query string whose rejection renders as an [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the study room API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "rooms": state.rooms.room_count(),
        "connections": state.registry.total_connections(),
    }))
}
