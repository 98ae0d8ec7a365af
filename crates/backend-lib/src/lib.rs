// ============================
// studyroom-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the study-room collaboration server.

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod handlers;
pub mod membership;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod room_actor;
pub mod storage;
pub mod validation;
pub mod ws_router;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthService, DefaultAuth, SessionManager, UserDirectory};
use crate::broadcast::BroadcastRouter;
use crate::config::{Settings, StorageBackend};
use crate::error::AppError;
use crate::registry::ConnectionRegistry;
use crate::room::RoomManager;
use crate::storage::{FlatFileStorage, MemoryStorage, Storage};

/// Application state shared across all handlers
pub struct AppState {
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    /// Storage backend
    pub storage: Arc<dyn Storage>,
    /// Room directory
    pub rooms: Arc<RoomManager>,
    /// Live connections per room
    pub registry: Arc<ConnectionRegistry>,
    /// Event fan-out
    pub router: Arc<BroadcastRouter>,
    pub users: Arc<UserDirectory>,
    pub sessions: SessionManager,
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
}

impl AppState {
    /// Create the application state with the storage backend named in `settings`
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let storage: Arc<dyn Storage> = match settings.storage {
            StorageBackend::File => Arc::new(FlatFileStorage::new(&settings.data_dir)?),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(Self::with_storage(settings, storage))
    }

    pub fn with_storage(settings: Settings, storage: Arc<dyn Storage>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(BroadcastRouter::new(
            registry.clone(),
            settings.live.echo_to_sender,
        ));
        let rooms = Arc::new(RoomManager::new(storage.clone(), settings.rooms.clone()));
        let users = Arc::new(UserDirectory::new());
        let sessions = SessionManager::new(Duration::from_secs(settings.session_ttl_secs));
        let auth = Arc::new(DefaultAuth::new(
            users.clone(),
            storage.clone(),
            sessions.clone(),
            settings.password_requirements.clone(),
            settings.password_hash.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            storage,
            rooms,
            registry,
            router,
            users,
            sessions,
            auth,
        }
    }

    /// Load persisted users, then rooms; returns `(users, rooms)` restored
    pub async fn restore(&self) -> Result<(usize, usize), AppError> {
        let users = self.users.restore(self.storage.load_users().await?);
        let rooms = self.rooms.restore().await?;
        tracing::info!(users, rooms, known_users = self.users.len(), "state restored from storage");
        Ok((users, rooms))
    }
}
