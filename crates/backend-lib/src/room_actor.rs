// ============================
// studyroom-backend-lib/src/room_actor.rs
// ============================
//! One actor task per room.
//!
//! The actor owns the room's [`RoomRecord`] and is the only writer of it, so
//! join/leave/promote/update on one room are applied strictly one at a time.
//! Each transition runs on a copy of the record, is persisted, and only then
//! replaces the live record.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use studyroom_common::{RoomId, RoomKind, RoomUpdate, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;
use crate::membership::{JoinOutcome, LeaveOutcome, RoomRecord};
use crate::metrics::{HOST_HANDOFF, JOIN_REJECTED, MEMBER_JOINED, MEMBER_LEFT};
use crate::storage::Storage;

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

/// Message sent *into* the actor
#[derive(Debug)]
pub enum ActorMsg {
    Join {
        user_id: UserId,
        resp_tx: Reply<JoinOutcome>,
    },
    Leave {
        user_id: UserId,
        resp_tx: Reply<LeaveOutcome>,
    },
    Promote {
        actor: UserId,
        target: UserId,
        resp_tx: Reply<()>,
    },
    Update {
        actor: UserId,
        patch: RoomUpdate,
        resp_tx: Reply<RoomRecord>,
    },
    Snapshot {
        resp_tx: Reply<RoomRecord>,
    },
    /// Remove the persisted room and stop the actor
    Delete {
        actor: UserId,
        resp_tx: Reply<()>,
    },
}

/// Handle that other components keep. Kind and owner never change, so they
/// are cached here for filtering without a round trip.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub room_id: RoomId,
    pub kind: RoomKind,
    pub owner_id: UserId,
    cmd_tx: mpsc::UnboundedSender<ActorMsg>,
}

impl RoomHandle {
    /// A closed command channel means the room was deleted
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ActorMsg,
    ) -> Result<T, AppError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(resp_tx))
            .map_err(|_| AppError::RoomNotFound)?;
        resp_rx.await.map_err(|_| AppError::RoomNotFound)?
    }

    pub async fn join(&self, user_id: UserId) -> Result<JoinOutcome, AppError> {
        self.request(|resp_tx| ActorMsg::Join { user_id, resp_tx }).await
    }

    pub async fn leave(&self, user_id: UserId) -> Result<LeaveOutcome, AppError> {
        self.request(|resp_tx| ActorMsg::Leave { user_id, resp_tx }).await
    }

    pub async fn promote(&self, actor: UserId, target: UserId) -> Result<(), AppError> {
        self.request(|resp_tx| ActorMsg::Promote {
            actor,
            target,
            resp_tx,
        })
        .await
    }

    pub async fn update(&self, actor: UserId, patch: RoomUpdate) -> Result<RoomRecord, AppError> {
        self.request(|resp_tx| ActorMsg::Update {
            actor,
            patch,
            resp_tx,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<RoomRecord, AppError> {
        self.request(|resp_tx| ActorMsg::Snapshot { resp_tx }).await
    }

    pub async fn delete(&self, actor: UserId) -> Result<(), AppError> {
        self.request(|resp_tx| ActorMsg::Delete { actor, resp_tx }).await
    }
}

pub struct RoomActor {
    record: RoomRecord,
    storage: Arc<dyn Storage>,
}

impl RoomActor {
    pub fn new(record: RoomRecord, storage: Arc<dyn Storage>) -> Self {
        RoomActor { record, storage }
    }

    /// Apply `transition` to a copy, persist it if anything changed, then commit
    async fn commit<T>(
        &mut self,
        transition: impl FnOnce(&mut RoomRecord) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut next = self.record.clone();
        let outcome = transition(&mut next)?;
        if next != self.record {
            self.storage.save_room(&next).await?;
            self.record = next;
        }
        Ok(outcome)
    }

    pub async fn handle_join(&mut self, user_id: UserId) -> Result<JoinOutcome, AppError> {
        let room_id = self.record.room.id;
        let result = self.commit(|rec| rec.join(user_id, Utc::now())).await;

        match &result {
            Ok(JoinOutcome::Joined) => {
                counter!(MEMBER_JOINED).increment(1);
                tracing::info!(room_id, user_id, "member joined");
            },
            Ok(JoinOutcome::AlreadyMember) => {
                tracing::debug!(room_id, user_id, "join ignored, already a member");
            },
            Err(e @ (AppError::CapacityExceeded | AppError::RoomInactive)) => {
                counter!(JOIN_REJECTED, "reason" => e.error_code()).increment(1);
                tracing::info!(room_id, user_id, reason = %e, "join rejected");
            },
            Err(e) => tracing::warn!(room_id, user_id, error = %e, "join failed"),
        }
        result
    }

    pub async fn handle_leave(&mut self, user_id: UserId) -> Result<LeaveOutcome, AppError> {
        let room_id = self.record.room.id;
        let outcome = self.commit(|rec| Ok(rec.leave(user_id))).await?;

        if let LeaveOutcome::Left { new_host } = outcome {
            counter!(MEMBER_LEFT).increment(1);
            tracing::info!(room_id, user_id, "member left");
            if let Some(host) = new_host {
                counter!(HOST_HANDOFF).increment(1);
                tracing::info!(room_id, from = user_id, to = host, "host role handed off");
            }
        }
        Ok(outcome)
    }

    pub async fn handle_promote(&mut self, actor: UserId, target: UserId) -> Result<(), AppError> {
        self.commit(|rec| rec.promote(actor, target)).await?;
        tracing::info!(room_id = self.record.room.id, actor, target, "participant promoted to host");
        Ok(())
    }

    pub async fn handle_update(
        &mut self,
        actor: UserId,
        patch: RoomUpdate,
    ) -> Result<RoomRecord, AppError> {
        self.commit(|rec| rec.update(actor, patch, Utc::now())).await?;
        tracing::info!(room_id = self.record.room.id, actor, "room updated");
        Ok(self.record.clone())
    }

    pub async fn handle_delete(&self, actor: UserId) -> Result<(), AppError> {
        if actor != self.record.room.owner_id {
            return Err(AppError::Forbidden(
                "only the room owner can delete this room".to_string(),
            ));
        }
        self.storage.delete_room(self.record.room.id).await?;
        tracing::info!(room_id = self.record.room.id, actor, "room deleted");
        Ok(())
    }

    #[cfg(test)]
    fn record(&self) -> &RoomRecord {
        &self.record
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ActorMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                ActorMsg::Join { user_id, resp_tx } => {
                    let result = self.handle_join(user_id).await;
                    let _ = resp_tx.send(result);
                },
                ActorMsg::Leave { user_id, resp_tx } => {
                    let result = self.handle_leave(user_id).await;
                    let _ = resp_tx.send(result);
                },
                ActorMsg::Promote {
                    actor,
                    target,
                    resp_tx,
                } => {
                    let result = self.handle_promote(actor, target).await;
                    let _ = resp_tx.send(result);
                },
                ActorMsg::Update {
                    actor,
                    patch,
                    resp_tx,
                } => {
                    let result = self.handle_update(actor, patch).await;
                    let _ = resp_tx.send(result);
                },
                ActorMsg::Snapshot { resp_tx } => {
                    let _ = resp_tx.send(Ok(self.record.clone()));
                },
                ActorMsg::Delete { actor, resp_tx } => {
                    let result = self.handle_delete(actor).await;
                    let deleted = result.is_ok();
                    let _ = resp_tx.send(result);
                    if deleted {
                        break;
                    }
                },
            }
        }
        // Dropping `rx` here fails every queued request with RoomNotFound
    }
}

/// Spawn a new room actor and return its handle
pub fn spawn_room_actor(record: RoomRecord, storage: Arc<dyn Storage>) -> RoomHandle {
    let (cmd_tx, rx_cmd) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        room_id: record.room.id,
        kind: record.room.kind,
        owner_id: record.room.owner_id,
        cmd_tx,
    };
    let actor = RoomActor::new(record, storage);

    tokio::spawn(async move {
        actor.run(rx_cmd).await;
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::Room;
    use crate::storage::{MemoryStorage, Storage};
    use async_trait::async_trait;
    use serde_json::json;
    use studyroom_common::Role;

    const OWNER: UserId = 1;

    fn record(max_participants: u32) -> RoomRecord {
        RoomRecord::new(Room {
            id: 11,
            name: "Chemistry".to_string(),
            description: None,
            kind: RoomKind::Public,
            owner_id: OWNER,
            max_participants,
            settings: json!({}),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        })
    }

    /// Storage whose writes always fail
    struct BrokenStorage;

    #[async_trait]
    impl Storage for BrokenStorage {
        async fn save_room(&self, _record: &RoomRecord) -> Result<(), AppError> {
            Err(AppError::Internal("disk full".to_string()))
        }

        async fn delete_room(&self, _room_id: RoomId) -> Result<(), AppError> {
            Err(AppError::Internal("disk full".to_string()))
        }

        async fn load_rooms(&self) -> Result<Vec<RoomRecord>, AppError> {
            Ok(Vec::new())
        }

        async fn save_user(&self, _user: &crate::auth::User) -> Result<(), AppError> {
            Err(AppError::Internal("disk full".to_string()))
        }

        async fn load_users(&self) -> Result<Vec<crate::auth::User>, AppError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_join_persists_membership() {
        let storage = Arc::new(MemoryStorage::new());
        let mut actor = RoomActor::new(record(5), storage.clone());

        assert_eq!(actor.handle_join(2).await.unwrap(), JoinOutcome::Joined);

        let stored = storage.load_rooms().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].member_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_no_partial_mutation() {
        let mut actor = RoomActor::new(record(5), Arc::new(BrokenStorage));

        assert!(actor.handle_join(2).await.is_err());
        assert_eq!(actor.record().member_count(), 1);

        assert!(actor.handle_leave(OWNER).await.is_err());
        assert_eq!(actor.record().membership(OWNER).map(|m| m.role), Some(Role::Host));
    }

    #[tokio::test]
    async fn test_concurrent_joins_respect_capacity() {
        let handle = spawn_room_actor(record(4), Arc::new(MemoryStorage::new()));

        let mut tasks = tokio::task::JoinSet::new();
        for user in 2..=20 {
            let handle = handle.clone();
            tasks.spawn(async move { handle.join(user).await });
        }

        let mut joined = 0;
        let mut rejected = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(JoinOutcome::Joined) => joined += 1,
                Err(AppError::CapacityExceeded) => rejected += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(joined, 3);
        assert_eq!(rejected, 16);
        assert_eq!(handle.snapshot().await.unwrap().member_count(), 4);
    }

    #[tokio::test]
    async fn test_delete_stops_actor() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = record(5);
        storage.save_room(&rec).await.unwrap();
        let handle = spawn_room_actor(rec, storage.clone());

        assert!(matches!(handle.delete(2).await, Err(AppError::Forbidden(_))));
        handle.delete(OWNER).await.unwrap();

        assert!(storage.load_rooms().await.unwrap().is_empty());
        assert!(matches!(handle.join(3).await, Err(AppError::RoomNotFound)));
        assert!(matches!(handle.snapshot().await, Err(AppError::RoomNotFound)));
    }
}
