// ============================
// studyroom-backend-lib/src/registry.rs
// ============================
//! Live connection registry.
//!
//! Tracks, per room, every socket currently attached to it. A connection is
//! only a bounded outbound queue plus an id; the socket writer on the other
//! end of the queue belongs to the live handler.
use dashmap::DashMap;
use metrics::gauge;
use std::collections::HashMap;
use std::sync::Arc;
use studyroom_common::RoomId;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::WS_ACTIVE;

/// A serialized event ready to be written to a socket
pub type Frame = Arc<str>;

/// Identity of one socket, distinct from the user behind it
pub type ConnectionId = Uuid;

#[derive(Clone, Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub tx: mpsc::Sender<Frame>,
}

impl Connection {
    /// New connection with a fresh id and its receiving end
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Connection {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: DashMap<RoomId, HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, room_id: RoomId, conn: Connection) {
        let id = conn.id;
        self.rooms.entry(room_id).or_default().insert(id, conn);
        gauge!(WS_ACTIVE).set(self.total_connections() as f64);
        tracing::debug!(room_id, connection_id = %id, "connection registered");
    }

    /// Remove one connection. Returns false when it was not registered.
    /// A room whose last connection leaves is dropped from the map.
    pub fn unregister(&self, room_id: RoomId, conn_id: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(&room_id) {
            Some(mut conns) => conns.remove(&conn_id).is_some(),
            None => false,
        };
        self.rooms.remove_if(&room_id, |_, conns| conns.is_empty());

        if removed {
            gauge!(WS_ACTIVE).set(self.total_connections() as f64);
            tracing::debug!(room_id, connection_id = %conn_id, "connection unregistered");
        }
        removed
    }

    /// Snapshot of a room's connections, optionally leaving one out.
    /// The map lock is released before the caller sees anything.
    pub fn for_each_in(
        &self,
        room_id: RoomId,
        excluding: Option<ConnectionId>,
    ) -> impl Iterator<Item = Connection> {
        let snapshot: Vec<Connection> = self
            .rooms
            .get(&room_id)
            .map(|conns| {
                conns
                    .values()
                    .filter(|c| Some(c.id) != excluding)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        snapshot.into_iter()
    }

    pub fn connection_count(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map(|c| c.len()).unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().len()).sum()
    }

    /// Rooms with at least one live connection
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
