// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation module.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use studyroom_common::{RoomCreate, RoomUpdate};
use thiserror::Error;

// Common validation constants
const MAX_ROOM_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_PARTICIPANTS_LIMIT: u32 = 1000;
const MAX_DISPLAY_NAME_LENGTH: usize = 64;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("username pattern compiles"));

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid room name: {0}")]
    InvalidRoomName(String),

    #[error("Invalid description: {0}")]
    InvalidDescription(String),

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a room name
pub fn validate_room_name(name: &str) -> ValidationResult<&str> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidRoomName(
            "Room name must not be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(ValidationError::InvalidRoomName(format!(
            "Room name must be between 1 and {MAX_ROOM_NAME_LENGTH} characters"
        )));
    }

    Ok(name)
}

pub fn validate_description(description: &str) -> ValidationResult<&str> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::InvalidDescription(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(description)
}

/// Validate the maximum number of concurrent members
pub fn validate_max_participants(max: u32) -> ValidationResult<u32> {
    if max == 0 || max > MAX_PARTICIPANTS_LIMIT {
        return Err(ValidationError::InvalidCapacity(format!(
            "max_participants must be between 1 and {MAX_PARTICIPANTS_LIMIT}"
        )));
    }
    Ok(max)
}

/// Room settings are opaque, but must be a JSON object
pub fn validate_settings(settings: &Value) -> ValidationResult<&Value> {
    if !settings.is_object() {
        return Err(ValidationError::InvalidSettings(
            "settings must be a JSON object".to_string(),
        ));
    }
    Ok(settings)
}

pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username must be 3-32 characters of letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    Ok(username)
}

pub fn validate_display_name(display_name: &str) -> ValidationResult<&str> {
    if display_name.trim().is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::InvalidDisplayName(format!(
            "Display name must be between 1 and {MAX_DISPLAY_NAME_LENGTH} characters"
        )));
    }
    Ok(display_name)
}

/// Validate a room creation request
pub fn validate_room_create(req: &RoomCreate) -> ValidationResult<()> {
    validate_room_name(&req.name)?;
    if let Some(description) = &req.description {
        validate_description(description)?;
    }
    if let Some(max) = req.max_participants {
        validate_max_participants(max)?;
    }
    if let Some(settings) = &req.settings {
        validate_settings(settings)?;
    }
    Ok(())
}

/// Validate a partial room update; only present fields are checked
pub fn validate_room_update(req: &RoomUpdate) -> ValidationResult<()> {
    if let Some(name) = &req.name {
        validate_room_name(name)?;
    }
    if let Some(description) = &req.description {
        validate_description(description)?;
    }
    if let Some(max) = req.max_participants {
        validate_max_participants(max)?;
    }
    if let Some(settings) = &req.settings {
        validate_settings(settings)?;
    }
    Ok(())
}
