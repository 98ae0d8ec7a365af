// ===========================
// crates/backend-lib/tests/common/mod.rs
// ===========================
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use studyroom_backend_lib::{
    config::{PasswordHashSettings, Settings, StorageBackend},
    ws_router, AppState,
};
use studyroom_common::{LoginRequest, RegisterRequest};
use tower::ServiceExt;

/// In-memory settings with a cheap password hash
pub fn test_settings() -> Settings {
    Settings {
        storage: StorageBackend::Memory,
        password_hash: PasswordHashSettings { log_n: 10 },
        ..Settings::default()
    }
}

pub fn test_app() -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::new(test_settings()).expect("memory state"));
    let app = ws_router::create_router(state.clone());
    (state, app)
}

/// Register and log in `username`, returning `(user_id, token)`
pub async fn signup(state: &AppState, username: &str) -> (u64, String) {
    let user = state
        .auth
        .register(RegisterRequest {
            username: username.to_string(),
            password: "studytime1".to_string(),
            display_name: None,
        })
        .await
        .expect("register");
    let token = state
        .auth
        .login(LoginRequest {
            username: username.to_string(),
            password: "studytime1".to_string(),
        })
        .await
        .expect("login");
    (user.id, token.access_token)
}

/// Fire one request through the router and decode the JSON body
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
