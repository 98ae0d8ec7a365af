// ============================
// studyroom-backend-lib/src/room.rs
// ============================
//! Room directory and actor coordination.
use chrono::Utc;
use dashmap::DashMap;
use metrics::{counter, gauge};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use studyroom_common::{
    ParticipantResponse, RoomCreate, RoomId, RoomKind, RoomResponse, RoomUpdate, UserId,
};

use crate::config::RoomSettings;
use crate::error::AppError;
use crate::membership::{JoinOutcome, LeaveOutcome, Room, RoomRecord};
use crate::metrics::{ROOM_ACTIVE, ROOM_CREATED, ROOM_DELETED};
use crate::room_actor::{spawn_room_actor, RoomHandle};
use crate::storage::Storage;
use crate::validation;

/// Manager for all rooms
pub struct RoomManager {
    rooms: DashMap<RoomId, RoomHandle>,
    next_id: AtomicU64,
    storage: Arc<dyn Storage>,
    settings: RoomSettings,
}

impl RoomManager {
    /// Create an empty room manager
    pub fn new(storage: Arc<dyn Storage>, settings: RoomSettings) -> Self {
        RoomManager {
            rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            storage,
            settings,
        }
    }

    /// Respawn actors for every persisted room. Returns the number restored.
    pub async fn restore(&self) -> Result<usize, AppError> {
        let records = self.storage.load_rooms().await?;
        let count = records.len();

        for record in records {
            let id = record.room.id;
            self.next_id.fetch_max(id + 1, Ordering::SeqCst);
            let handle = spawn_room_actor(record, self.storage.clone());
            self.rooms.insert(id, handle);
        }

        gauge!(ROOM_ACTIVE).set(self.rooms.len() as f64);
        tracing::info!(rooms = count, "restored rooms from storage");
        Ok(count)
    }

    /// Create a room with `owner` enrolled as host
    pub async fn create_room(
        &self,
        owner: UserId,
        req: RoomCreate,
    ) -> Result<RoomResponse, AppError> {
        validation::validate_room_create(&req)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = RoomRecord::new(Room {
            id,
            name: req.name,
            description: req.description,
            kind: req.room_type,
            owner_id: owner,
            max_participants: req
                .max_participants
                .unwrap_or(self.settings.default_max_participants),
            settings: req.settings.unwrap_or_else(|| Value::Object(Default::default())),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        });

        self.storage.save_room(&record).await?;
        let response = record.to_response();
        let handle = spawn_room_actor(record, self.storage.clone());
        self.rooms.insert(id, handle);

        counter!(ROOM_CREATED).increment(1);
        gauge!(ROOM_ACTIVE).set(self.rooms.len() as f64);
        tracing::info!(room_id = id, owner_id = owner, "room created");

        Ok(response)
    }

    /// Get a room handle by ID
    pub fn handle(&self, room_id: RoomId) -> Result<RoomHandle, AppError> {
        self.rooms
            .get(&room_id)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::RoomNotFound)
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomResponse, AppError> {
        Ok(self.handle(room_id)?.snapshot().await?.to_response())
    }

    /// Rooms ordered by id, optionally filtered by kind
    pub async fn list_rooms(
        &self,
        kind: Option<RoomKind>,
        skip: usize,
        limit: Option<usize>,
    ) -> Vec<RoomResponse> {
        let limit = limit
            .unwrap_or(self.settings.max_page_size)
            .min(self.settings.max_page_size);

        let mut handles: Vec<RoomHandle> = self
            .rooms
            .iter()
            .filter(|entry| kind.map_or(true, |k| entry.kind == k))
            .map(|entry| entry.value().clone())
            .collect();
        handles.sort_by_key(|h| h.room_id);

        let mut rooms = Vec::with_capacity(limit.min(handles.len()));
        for handle in handles.into_iter().skip(skip).take(limit) {
            // A room deleted since the handle was collected is simply left out
            if let Ok(record) = handle.snapshot().await {
                rooms.push(record.to_response());
            }
        }
        rooms
    }

    /// Patch room metadata; owner or host only
    pub async fn update_room(
        &self,
        room_id: RoomId,
        actor: UserId,
        patch: RoomUpdate,
    ) -> Result<RoomResponse, AppError> {
        let handle = self.handle(room_id)?;
        validation::validate_room_update(&patch)?;
        Ok(handle.update(actor, patch).await?.to_response())
    }

    /// Delete a room and all its memberships; owner only
    pub async fn delete_room(&self, room_id: RoomId, actor: UserId) -> Result<(), AppError> {
        let handle = self.handle(room_id)?;
        handle.delete(actor).await?;

        if self.rooms.remove(&room_id).is_some() {
            counter!(ROOM_DELETED).increment(1);
            gauge!(ROOM_ACTIVE).set(self.rooms.len() as f64);
        }
        Ok(())
    }

    pub async fn join(&self, room_id: RoomId, user_id: UserId) -> Result<JoinOutcome, AppError> {
        self.handle(room_id)?.join(user_id).await
    }

    pub async fn leave(&self, room_id: RoomId, user_id: UserId) -> Result<LeaveOutcome, AppError> {
        self.handle(room_id)?.leave(user_id).await
    }

    pub async fn promote(
        &self,
        room_id: RoomId,
        actor: UserId,
        target: UserId,
    ) -> Result<(), AppError> {
        self.handle(room_id)?.promote(actor, target).await
    }

    /// Memberships in join order
    pub async fn participants(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ParticipantResponse>, AppError> {
        Ok(self.handle(room_id)?.snapshot().await?.participants())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
