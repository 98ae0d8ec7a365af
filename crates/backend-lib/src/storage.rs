// ============================
// studyroom-backend-lib/src/storage.rs
// ============================
//! Storage abstraction with flat-file and in-memory implementations.
use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use studyroom_common::{RoomId, UserId};
use tokio::fs as tokio_fs;

use crate::auth::User;
use crate::error::AppError;
use crate::membership::RoomRecord;

/// Trait for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert or replace a room together with its memberships
    async fn save_room(&self, record: &RoomRecord) -> Result<(), AppError>;

    /// Remove a room and, with it, every membership
    async fn delete_room(&self, room_id: RoomId) -> Result<(), AppError>;

    /// Every persisted room, ordered by id
    async fn load_rooms(&self) -> Result<Vec<RoomRecord>, AppError>;

    /// Insert or replace a user account
    async fn save_user(&self, user: &User) -> Result<(), AppError>;

    /// Every persisted user, ordered by id
    async fn load_users(&self) -> Result<Vec<User>, AppError>;
}

/// Flat-file implementation of the Storage trait
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("rooms"))?;
        fs::create_dir_all(root.join("users"))?;
        Ok(Self { root })
    }

    fn room_path(&self, room_id: RoomId) -> PathBuf {
        self.root.join("rooms").join(format!("{room_id}.json"))
    }

    fn user_path(&self, user_id: UserId) -> PathBuf {
        self.root.join("users").join(format!("{user_id}.json"))
    }

    /// Write `path` via a temp file so readers never see a torn record
    async fn write_atomic(path: &Path, json: String) -> Result<(), AppError> {
        let tmp = path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Parse every `*.json` file in `dir`, skipping unreadable ones
    async fn read_all<T: serde::de::DeserializeOwned>(dir: PathBuf) -> Result<Vec<T>, AppError> {
        let mut items = Vec::new();
        let mut entries = tokio_fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio_fs::read_to_string(&path).await?;
            match serde_json::from_str::<T>(&content) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                },
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl Storage for FlatFileStorage {
    async fn save_room(&self, record: &RoomRecord) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(record)?;
        Self::write_atomic(&self.room_path(record.room.id), json).await
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<(), AppError> {
        match tokio_fs::remove_file(self.room_path(room_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_rooms(&self) -> Result<Vec<RoomRecord>, AppError> {
        let mut rooms: Vec<RoomRecord> = Self::read_all(self.root.join("rooms")).await?;
        rooms.sort_by_key(|r| r.room.id);
        Ok(rooms)
    }

    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(user)?;
        Self::write_atomic(&self.user_path(user.id), json).await
    }

    async fn load_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = Self::read_all(self.root.join("users")).await?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

/// Process-local storage, used by tests and `storage = "memory"`
#[derive(Clone, Default)]
pub struct MemoryStorage {
    rooms: Arc<DashMap<RoomId, RoomRecord>>,
    users: Arc<DashMap<UserId, User>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_room(&self, record: &RoomRecord) -> Result<(), AppError> {
        self.rooms.insert(record.room.id, record.clone());
        Ok(())
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<(), AppError> {
        self.rooms.remove(&room_id);
        Ok(())
    }

    async fn load_rooms(&self) -> Result<Vec<RoomRecord>, AppError> {
        let mut rooms: Vec<RoomRecord> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.room.id);
        Ok(rooms)
    }

    async fn save_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn load_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}
