// ============================
// studyroom-backend-lib/src/broadcast.rs
// ============================
//! Fan-out of live events to every connection in a room.
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use studyroom_common::{ClientEvent, RoomId, ServerEvent};
use tokio::sync::mpsc::error::TrySendError;

use crate::error::AppError;
use crate::metrics::{DELIVERY_FAILED, EVENT_DROPPED, EVENT_RELAYED};
use crate::registry::{ConnectionId, ConnectionRegistry, Frame};

/// What happened to one broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Queue full, event skipped for that connection only
    pub lagged: usize,
    /// Queue closed, connection unregistered
    pub closed: usize,
}

pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
    echo_to_sender: bool,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, echo_to_sender: bool) -> Self {
        Self {
            registry,
            echo_to_sender,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Relay one inbound text frame. Frames that don't parse as a known event
    /// are dropped and `None` is returned; the caller keeps the socket open.
    pub fn on_event(
        &self,
        room_id: RoomId,
        sender: ConnectionId,
        raw: &str,
    ) -> Option<DeliveryReport> {
        let event = match serde_json::from_str::<ClientEvent>(raw) {
            Ok(event) => event,
            Err(e) => {
                let err = AppError::MalformedEvent(e.to_string());
                counter!(EVENT_DROPPED).increment(1);
                tracing::debug!(room_id, connection_id = %sender, error = %err, "dropping inbound event");
                return None;
            },
        };

        let exclude = (!self.echo_to_sender).then_some(sender);
        Some(self.deliver(room_id, &event.into_server_event(Utc::now()), exclude))
    }

    /// Tell everyone in the room, newcomer included, that someone connected
    pub fn announce_arrival(&self, room_id: RoomId, who: &str) -> DeliveryReport {
        let event = ServerEvent::system(format!("{who} joined the room"), Utc::now());
        self.deliver(room_id, &event, None)
    }

    /// Tell the remaining connections that someone left. Call after unregistering.
    pub fn announce_departure(&self, room_id: RoomId, who: &str) -> DeliveryReport {
        let event = ServerEvent::system(format!("{who} left the room"), Utc::now());
        self.deliver(room_id, &event, None)
    }

    /// Serialize once and push to every connection in the room snapshot
    pub fn deliver(
        &self,
        room_id: RoomId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> DeliveryReport {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(room_id, error = %e, "failed to serialize event");
                return DeliveryReport::default();
            },
        };

        let mut report = DeliveryReport::default();
        for conn in self.registry.for_each_in(room_id, exclude) {
            match conn.tx.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.lagged += 1;
                    counter!(DELIVERY_FAILED, "reason" => "full").increment(1);
                    tracing::debug!(room_id, connection_id = %conn.id, kind = event.kind(), "outbound queue full, event skipped");
                },
                Err(TrySendError::Closed(_)) => {
                    report.closed += 1;
                    counter!(DELIVERY_FAILED, "reason" => "closed").increment(1);
                    tracing::warn!(room_id, connection_id = %conn.id, "outbound queue closed, removing connection");
                    self.registry.unregister(room_id, conn.id);
                },
            }
        }

        counter!(EVENT_RELAYED, "kind" => event.kind()).increment(1);
        tracing::trace!(
            room_id,
            kind = event.kind(),
            sent_at = %event.timestamp(),
            delivered = report.delivered,
            lagged = report.lagged,
            "event relayed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Connection;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    fn router(echo: bool) -> BroadcastRouter {
        BroadcastRouter::new(Arc::new(ConnectionRegistry::new()), echo)
    }

    fn attach(router: &BroadcastRouter, room: RoomId, cap: usize) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let (conn, rx) = Connection::new(cap);
        let id = conn.id;
        router.registry().register(room, conn);
        (id, rx)
    }

    fn next_json(rx: &mut mpsc::Receiver<Frame>) -> Option<Value> {
        rx.try_recv()
            .ok()
            .map(|frame| serde_json::from_str(&frame).unwrap())
    }

    #[test]
    fn test_chat_reaches_everyone_but_sender_without_echo() {
        let router = router(false);
        let (a, mut rx_a) = attach(&router, 1, 8);
        let (_b, mut rx_b) = attach(&router, 1, 8);
        let (_c, mut rx_c) = attach(&router, 1, 8);

        let report = router
            .on_event(1, a, r#"{"type":"chat","message":"hi","user":"ann"}"#)
            .unwrap();
        assert_eq!(report.delivered, 2);

        for rx in [&mut rx_b, &mut rx_c] {
            let msg = next_json(rx).unwrap();
            assert_eq!(msg["type"], "chat");
            assert_eq!(msg["message"], "hi");
            assert_eq!(msg["user"], "ann");
            assert!(msg["timestamp"].is_string());
            assert!(next_json(rx).is_none());
        }
        assert!(next_json(&mut rx_a).is_none());
    }

    #[test]
    fn test_echo_is_consistent_across_kinds() {
        let router = router(true);
        let (a, mut rx_a) = attach(&router, 1, 8);
        let (_b, mut rx_b) = attach(&router, 1, 8);

        let frames = [
            r#"{"type":"chat","message":"one"}"#,
            r#"{"type":"draw","data":{"path":[1,2,3]}}"#,
            r#"{"type":"cursor","x":1.5,"y":2.0}"#,
            r#"{"type":"chat","message":"two"}"#,
        ];
        for raw in frames {
            assert_eq!(router.on_event(1, a, raw).unwrap().delivered, 2);
        }

        for rx in [&mut rx_a, &mut rx_b] {
            let kinds: Vec<Value> = std::iter::from_fn(|| next_json(rx))
                .map(|m| m["type"].clone())
                .collect();
            assert_eq!(kinds, vec![json!("chat"), json!("draw"), json!("cursor"), json!("chat")]);
        }
    }

    #[test]
    fn test_chat_without_user_is_anonymous() {
        let router = router(true);
        let (a, mut rx_a) = attach(&router, 1, 8);

        router.on_event(1, a, r#"{"type":"chat","message":"hello"}"#);
        assert_eq!(next_json(&mut rx_a).unwrap()["user"], "Anonymous");
    }

    #[test]
    fn test_events_stay_in_their_room() {
        let router = router(true);
        let (a, _rx_a) = attach(&router, 1, 8);
        let (_other, mut rx_other) = attach(&router, 2, 8);

        router.on_event(1, a, r#"{"type":"draw","data":null}"#);
        assert!(next_json(&mut rx_other).is_none());
    }

    #[test]
    fn test_malformed_and_unknown_events_are_dropped() {
        let router = router(true);
        let (a, mut rx_a) = attach(&router, 1, 8);

        assert!(router.on_event(1, a, "not json").is_none());
        assert!(router.on_event(1, a, r#"{"type":"teleport"}"#).is_none());
        assert!(router.on_event(1, a, r#"{"type":"cursor","x":1}"#).is_none());
        assert!(next_json(&mut rx_a).is_none());
        // Still registered after garbage
        assert_eq!(router.registry().connection_count(1), 1);
    }

    #[test]
    fn test_closed_connection_is_unregistered() {
        let router = router(true);
        let (a, mut rx_a) = attach(&router, 1, 8);
        let (_dead, rx_dead) = attach(&router, 1, 8);
        drop(rx_dead);

        let report = router
            .on_event(1, a, r#"{"type":"chat","message":"anyone?"}"#)
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.closed, 1);
        assert_eq!(router.registry().connection_count(1), 1);
        assert!(next_json(&mut rx_a).is_some());
    }

    #[test]
    fn test_full_queue_skips_only_that_connection() {
        let router = router(true);
        let (a, mut rx_a) = attach(&router, 1, 8);
        let (_slow, mut rx_slow) = attach(&router, 1, 1);

        router.on_event(1, a, r#"{"type":"chat","message":"first"}"#);
        let report = router
            .on_event(1, a, r#"{"type":"chat","message":"second"}"#)
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.lagged, 1);
        assert_eq!(router.registry().connection_count(1), 2);

        assert_eq!(next_json(&mut rx_slow).unwrap()["message"], "first");
        assert!(next_json(&mut rx_slow).is_none());
        assert_eq!(next_json(&mut rx_a).unwrap()["message"], "first");
        assert_eq!(next_json(&mut rx_a).unwrap()["message"], "second");
    }

    #[test]
    fn test_arrival_includes_newcomer_and_departure_reaches_the_rest() {
        let router = router(false);
        let (_a, mut rx_a) = attach(&router, 1, 8);
        let (b, mut rx_b) = attach(&router, 1, 8);

        assert_eq!(router.announce_arrival(1, "bob").delivered, 2);
        assert_eq!(next_json(&mut rx_a).unwrap()["type"], "system");
        assert_eq!(next_json(&mut rx_b).unwrap()["message"], "bob joined the room");

        router.registry().unregister(1, b);
        assert_eq!(router.announce_departure(1, "bob").delivered, 1);
        assert_eq!(next_json(&mut rx_a).unwrap()["message"], "bob left the room");
        assert!(next_json(&mut rx_b).is_none());
    }
}
