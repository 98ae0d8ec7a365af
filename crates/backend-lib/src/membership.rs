// ============================
// studyroom-backend-lib/src/membership.rs
// ============================
//! Room records and the membership state machine.
//!
//! A [`RoomRecord`] is the unit of persistence: room metadata together with
//! its memberships. Every transition here is synchronous and operates on a
//! single record; the room actor serializes calls per room and persists the
//! result before committing it.
//!
//! Memberships are kept in join order. Host hand-off picks the earliest
//! joined remaining member, ties broken by the lowest user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use studyroom_common::{
    ParticipantResponse, Role, RoomId, RoomKind, RoomResponse, RoomUpdate, UserId,
};

use crate::error::AppError;

/// Room metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub kind: RoomKind,
    /// Set at creation, never changes
    pub owner_id: UserId,
    pub max_participants: u32,
    pub settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A user's durable presence in a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Result of a join request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

/// Result of a leave request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The membership was removed; `new_host` is set when the host role was handed off
    Left { new_host: Option<UserId> },
    NotMember,
}

/// Room plus memberships
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub room: Room,
    pub members: Vec<Membership>,
}

impl RoomRecord {
    /// New room with its owner enrolled as host
    pub fn new(room: Room) -> Self {
        let owner = Membership {
            user_id: room.owner_id,
            role: Role::Host,
            joined_at: room.created_at,
        };
        Self {
            room,
            members: vec![owner],
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn membership(&self, user_id: UserId) -> Option<&Membership> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_host(&self, user_id: UserId) -> bool {
        self.membership(user_id)
            .is_some_and(|m| m.role == Role::Host)
    }

    pub fn host_count(&self) -> usize {
        self.members.iter().filter(|m| m.role == Role::Host).count()
    }

    /// absent -> member{participant}
    pub fn join(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<JoinOutcome, AppError> {
        if self.membership(user_id).is_some() {
            return Ok(JoinOutcome::AlreadyMember);
        }
        if !self.room.is_active {
            return Err(AppError::RoomInactive);
        }
        if self.members.len() >= self.room.max_participants as usize {
            return Err(AppError::CapacityExceeded);
        }

        self.members.push(Membership {
            user_id,
            role: Role::Participant,
            joined_at: now,
        });
        Ok(JoinOutcome::Joined)
    }

    /// member{role} -> absent, handing the host role off if the last host leaves
    pub fn leave(&mut self, user_id: UserId) -> LeaveOutcome {
        let Some(index) = self.members.iter().position(|m| m.user_id == user_id) else {
            return LeaveOutcome::NotMember;
        };

        let leaving = self.members.remove(index);
        let mut new_host = None;

        if leaving.role == Role::Host && self.host_count() == 0 {
            if let Some(successor) = self
                .members
                .iter_mut()
                .min_by_key(|m| (m.joined_at, m.user_id))
            {
                successor.role = Role::Host;
                new_host = Some(successor.user_id);
            }
        }

        LeaveOutcome::Left { new_host }
    }

    /// member{any} -> member{host}; only the owner may promote
    pub fn promote(&mut self, actor: UserId, target: UserId) -> Result<(), AppError> {
        if actor != self.room.owner_id {
            return Err(AppError::Forbidden(
                "only the room owner can promote participants".to_string(),
            ));
        }

        let member = self
            .members
            .iter_mut()
            .find(|m| m.user_id == target)
            .ok_or(AppError::MembershipNotFound)?;
        member.role = Role::Host;
        Ok(())
    }

    /// Apply a metadata patch; the owner or any host may update
    pub fn update(
        &mut self,
        actor: UserId,
        patch: RoomUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if actor != self.room.owner_id && !self.is_host(actor) {
            return Err(AppError::Forbidden(
                "only the room owner or a host can update this room".to_string(),
            ));
        }

        let room = &mut self.room;
        if let Some(name) = patch.name {
            room.name = name;
        }
        if let Some(description) = patch.description {
            room.description = Some(description);
        }
        if let Some(max) = patch.max_participants {
            room.max_participants = max;
        }
        if let Some(settings) = patch.settings {
            room.settings = settings;
        }
        if let Some(is_active) = patch.is_active {
            room.is_active = is_active;
        }
        room.updated_at = Some(now);
        Ok(())
    }

    pub fn to_response(&self) -> RoomResponse {
        let room = &self.room;
        RoomResponse {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
            room_type: room.kind,
            owner_id: room.owner_id,
            max_participants: room.max_participants,
            settings: room.settings.clone(),
            is_active: room.is_active,
            created_at: room.created_at,
            updated_at: room.updated_at,
            participant_count: self.members.len(),
        }
    }

    /// Participants without display names; the HTTP layer fills those in
    pub fn participants(&self) -> Vec<ParticipantResponse> {
        self.members
            .iter()
            .map(|m| ParticipantResponse {
                room_id: self.room.id,
                user_id: m.user_id,
                role: m.role,
                joined_at: m.joined_at,
                username: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    const OWNER: UserId = 1;

    fn record(max_participants: u32) -> RoomRecord {
        RoomRecord::new(Room {
            id: 7,
            name: "Calculus".to_string(),
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

    fn later(seconds: i64) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(seconds)
    }

    #[test]
    fn creator_starts_as_sole_host() {
        let rec = record(10);
        assert_eq!(rec.member_count(), 1);
        assert_eq!(rec.membership(OWNER).map(|m| m.role), Some(Role::Host));
    }

    #[test]
    fn join_beyond_capacity_is_rejected() {
        let mut rec = record(1);
        let err = rec.join(2, later(1)).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded));
        assert_eq!(rec.member_count(), 1);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut rec = record(3);
        let mut rejected = 0;
        for user in 2..10 {
            match rec.join(user, later(user as i64)) {
                Ok(JoinOutcome::Joined) => {},
                Err(AppError::CapacityExceeded) => rejected += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
            assert!(rec.member_count() <= 3);
        }
        assert_eq!(rec.member_count(), 3);
        assert_eq!(rejected, 6);
    }

    #[test]
    fn join_is_idempotent() {
        let mut rec = record(10);
        assert_eq!(rec.join(2, later(1)).unwrap(), JoinOutcome::Joined);
        assert_eq!(rec.join(2, later(2)).unwrap(), JoinOutcome::AlreadyMember);
        assert_eq!(rec.members.iter().filter(|m| m.user_id == 2).count(), 1);
    }

    #[test]
    fn existing_member_rejoining_full_room_is_a_no_op() {
        let mut rec = record(1);
        assert_eq!(rec.join(OWNER, later(1)).unwrap(), JoinOutcome::AlreadyMember);
    }

    #[test]
    fn inactive_room_rejects_joins() {
        let mut rec = record(10);
        rec.room.is_active = false;
        assert!(matches!(rec.join(2, later(1)), Err(AppError::RoomInactive)));
        assert_eq!(rec.member_count(), 1);
    }

    #[test]
    fn host_leaving_hands_off_to_remaining_member() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();

        let outcome = rec.leave(OWNER);
        assert_eq!(outcome, LeaveOutcome::Left { new_host: Some(2) });
        assert_eq!(rec.member_count(), 1);
        assert_eq!(rec.membership(2).map(|m| m.role), Some(Role::Host));
    }

    #[test]
    fn hand_off_picks_earliest_joined_member() {
        let mut rec = record(10);
        rec.join(5, later(30)).unwrap();
        rec.join(3, later(10)).unwrap();
        rec.join(4, later(20)).unwrap();

        assert_eq!(rec.leave(OWNER), LeaveOutcome::Left { new_host: Some(3) });
        assert_eq!(rec.host_count(), 1);
    }

    #[test]
    fn sole_host_leaving_empties_the_room() {
        let mut rec = record(10);
        assert_eq!(rec.leave(OWNER), LeaveOutcome::Left { new_host: None });
        assert_eq!(rec.member_count(), 0);
        assert_eq!(rec.host_count(), 0);
    }

    #[test]
    fn no_hand_off_when_another_host_remains() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();
        rec.join(3, later(2)).unwrap();
        rec.promote(OWNER, 3).unwrap();

        assert_eq!(rec.leave(OWNER), LeaveOutcome::Left { new_host: None });
        assert_eq!(rec.membership(2).map(|m| m.role), Some(Role::Participant));
        assert_eq!(rec.host_count(), 1);
    }

    #[test]
    fn members_never_remain_without_a_host() {
        let mut rec = record(10);
        for user in 2..6 {
            rec.join(user, later(user as i64)).unwrap();
        }
        for leaver in [OWNER, 2, 3, 4] {
            rec.leave(leaver);
            assert!(rec.member_count() == 0 || rec.host_count() >= 1);
        }
    }

    #[test]
    fn leaving_twice_reports_not_member() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();
        rec.leave(2);
        assert_eq!(rec.leave(2), LeaveOutcome::NotMember);
    }

    #[test]
    fn only_owner_may_promote() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();
        rec.join(3, later(2)).unwrap();
        rec.promote(OWNER, 2).unwrap();
        let before = rec.clone();

        // A host who is not the owner is still refused
        let err = rec.promote(2, 3).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(rec, before);
    }

    #[test]
    fn promotion_keeps_existing_hosts() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();
        rec.promote(OWNER, 2).unwrap();
        assert_eq!(rec.host_count(), 2);
    }

    #[test]
    fn promoting_a_non_member_is_not_found() {
        let mut rec = record(10);
        assert!(matches!(
            rec.promote(OWNER, 99),
            Err(AppError::MembershipNotFound)
        ));
    }

    #[test]
    fn update_requires_owner_or_host() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();

        let patch = RoomUpdate {
            name: Some("Renamed".to_string()),
            ..RoomUpdate::default()
        };
        assert!(matches!(
            rec.update(2, patch.clone(), later(2)),
            Err(AppError::Forbidden(_))
        ));

        rec.promote(OWNER, 2).unwrap();
        rec.update(2, patch, later(3)).unwrap();
        assert_eq!(rec.room.name, "Renamed");
        assert!(rec.room.updated_at.is_some());
    }

    #[test]
    fn owner_keeps_update_rights_after_leaving() {
        let mut rec = record(10);
        rec.leave(OWNER);
        let patch = RoomUpdate {
            is_active: Some(false),
            ..RoomUpdate::default()
        };
        rec.update(OWNER, patch, later(1)).unwrap();
        assert!(!rec.room.is_active);
    }

    #[test]
    fn response_reports_participant_count() {
        let mut rec = record(10);
        rec.join(2, later(1)).unwrap();
        let response = rec.to_response();
        assert_eq!(response.participant_count, 2);
        assert_eq!(response.owner_id, OWNER);
        assert_eq!(rec.participants().len(), 2);
    }
}
