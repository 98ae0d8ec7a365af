// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing or invalid credentials")]
    Unauthenticated,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Room not found")]
    RoomNotFound,

    #[error("Membership not found")]
    MembershipNotFound,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Room has reached its maximum number of participants")]
    CapacityExceeded,

    #[error("Room is not active")]
    RoomInactive,

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RoomNotFound | AppError::MembershipNotFound | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            },
            AppError::CapacityExceeded | AppError::RoomInactive | AppError::UsernameTaken(_) => {
                StatusCode::CONFLICT
            },
            AppError::MalformedEvent(_) | AppError::InvalidInput(_) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            },
            AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "AUTH_001",
            AppError::InvalidCredentials => "AUTH_002",
            AppError::Forbidden(_) => "AUTH_004",
            AppError::UsernameTaken(_) => "AUTH_005",
            AppError::RoomNotFound => "ROOM_001",
            AppError::MembershipNotFound => "ROOM_002",
            AppError::CapacityExceeded => "ROOM_003",
            AppError::RoomInactive => "ROOM_004",
            AppError::NotFound(_) => "NF_001",
            AppError::MalformedEvent(_) => "EVT_001",
            AppError::InvalidInput(_) | AppError::Validation(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredentials => {
                "Authentication failed".to_string()
            },
            AppError::Forbidden(_) => "You are not allowed to perform this action".to_string(),
            AppError::UsernameTaken(_) => "Username already taken".to_string(),
            AppError::RoomNotFound => "Room not found".to_string(),
            AppError::MembershipNotFound => "Participant not found".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::CapacityExceeded => "Room is full".to_string(),
            AppError::RoomInactive => "Room is not active".to_string(),
            AppError::MalformedEvent(_) => "Invalid event format".to_string(),
            AppError::InvalidInput(_) | AppError::Validation(_) => {
                "Invalid input provided".to_string()
            },
            AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
