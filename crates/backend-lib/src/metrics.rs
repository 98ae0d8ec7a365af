// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_REJECTED: &str = "ws.rejected";
pub const EVENT_RELAYED: &str = "event.relayed";
pub const EVENT_DROPPED: &str = "event.dropped";
pub const DELIVERY_FAILED: &str = "delivery.failed";
pub const ROOM_CREATED: &str = "room.created";
pub const ROOM_DELETED: &str = "room.deleted";
pub const ROOM_ACTIVE: &str = "room.active";
pub const MEMBER_JOINED: &str = "member.joined";
pub const MEMBER_LEFT: &str = "member.left";
pub const JOIN_REJECTED: &str = "member.join_rejected";
pub const HOST_HANDOFF: &str = "member.host_handoff";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_EXPIRED: &str = "session.expired";
