// ============================
// crates/backend-lib/src/handlers/rooms.rs
// ============================
//! REST management surface for rooms and memberships.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use studyroom_common::{
    JoinResponse, MessageResponse, ParticipantResponse, RoomCreate, RoomId, RoomKind,
    RoomResponse, RoomUpdate, UserId,
};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::handlers::{AppJson, AppQuery};
use crate::membership::{JoinOutcome, LeaveOutcome};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListRoomsQuery {
    pub room_type: Option<RoomKind>,
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    AppQuery(query): AppQuery<ListRoomsQuery>,
) -> Json<Vec<RoomResponse>> {
    Json(
        state
            .rooms
            .list_rooms(query.room_type, query.skip, query.limit)
            .await,
    )
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(req): AppJson<RoomCreate>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let room = state.rooms.create_room(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<RoomResponse>, AppError> {
    Ok(Json(state.rooms.get_room(room_id).await?))
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(room_id): Path<RoomId>,
    AppJson(patch): AppJson<RoomUpdate>,
) -> Result<Json<RoomResponse>, AppError> {
    Ok(Json(
        state.rooms.update_room(room_id, user.user_id, patch).await?,
    ))
}

pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(room_id): Path<RoomId>,
) -> Result<StatusCode, AppError> {
    state.rooms.delete_room(room_id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<JoinResponse>, AppError> {
    let message = match state.rooms.join(room_id, user.user_id).await? {
        JoinOutcome::Joined => "Joined the room",
        JoinOutcome::AlreadyMember => "Already a member of this room",
    };
    Ok(Json(JoinResponse {
        message: message.to_string(),
        room_id,
    }))
}

pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = match state.rooms.leave(room_id, user.user_id).await? {
        LeaveOutcome::Left { .. } => "Left the room",
        LeaveOutcome::NotMember => "Not a member of this room",
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Vec<ParticipantResponse>>, AppError> {
    let mut participants = state.rooms.participants(room_id).await?;
    for p in &mut participants {
        p.username = state.users.lookup(p.user_id);
    }
    Ok(Json(participants))
}

pub async fn promote_participant(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((room_id, target)): Path<(RoomId, UserId)>,
) -> Result<Json<MessageResponse>, AppError> {
    state.rooms.promote(room_id, user.user_id, target).await?;
    Ok(Json(MessageResponse {
        message: "Participant promoted to host".to_string(),
    }))
}
