// ============================
// studyroom-backend-lib/src/auth/users.rs
// ============================
//! In-process user directory.
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use studyroom_common::{UserId, UserResponse};

use crate::error::AppError;

/// Persisted alongside rooms so ids stay stable across restarts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub password_hash: String,
}

impl User {
    /// Name shown to other participants
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id,
            username: self.username.clone(),
            display_name: self.label().to_string(),
        }
    }
}

pub struct UserDirectory {
    users: DashMap<UserId, User>,
    by_username: DashMap<String, UserId>,
    next_id: AtomicU64,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            by_username: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usernames are unique, compared case-insensitively
    pub fn register(
        &self,
        username: &str,
        display_name: Option<String>,
        password_hash: String,
    ) -> Result<User, AppError> {
        match self.by_username.entry(username.to_lowercase()) {
            Entry::Occupied(_) => Err(AppError::UsernameTaken(username.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let user = User {
                    id,
                    username: username.to_string(),
                    display_name,
                    password_hash,
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            },
        }
    }

    pub fn find_by_username(&self, username: &str) -> Option<User> {
        let id = *self.by_username.get(&username.to_lowercase())?;
        self.get(id)
    }

    pub fn get(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|u| u.value().clone())
    }

    /// Display label for a user, if known
    pub fn lookup(&self, user_id: UserId) -> Option<String> {
        self.users.get(&user_id).map(|u| u.label().to_string())
    }

    /// Load persisted users; later ids continue past the highest one seen
    pub fn restore(&self, users: Vec<User>) -> usize {
        let count = users.len();
        for user in users {
            self.next_id.fetch_max(user.id + 1, Ordering::SeqCst);
            self.by_username.insert(user.username.to_lowercase(), user.id);
            self.users.insert(user.id, user);
        }
        count
    }

    /// Drop a user whose registration could not be persisted
    pub(crate) fn remove(&self, user_id: UserId) {
        if let Some((_, user)) = self.users.remove(&user_id) {
            self.by_username.remove(&user.username.to_lowercase());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let users = UserDirectory::new();
        let ann = users
            .register("ann", Some("Ann Lee".to_string()), "hash".to_string())
            .unwrap();
        let bob = users.register("bob", None, "hash".to_string()).unwrap();

        assert_ne!(ann.id, bob.id);
        assert_eq!(users.lookup(ann.id).as_deref(), Some("Ann Lee"));
        assert_eq!(users.lookup(bob.id).as_deref(), Some("bob"));
        assert_eq!(users.lookup(999), None);
        assert_eq!(users.find_by_username("ANN").map(|u| u.id), Some(ann.id));
    }

    #[test]
    fn test_duplicate_username_is_rejected() {
        let users = UserDirectory::new();
        users.register("ann", None, "hash".to_string()).unwrap();
        let err = users.register("Ann", None, "hash".to_string()).unwrap_err();
        assert!(matches!(err, AppError::UsernameTaken(_)));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_response_falls_back_to_username() {
        let users = UserDirectory::new();
        let ann = users
            .register("ann", Some("Ann Lee".to_string()), "hash".to_string())
            .unwrap();
        let bob = users.register("bob", None, "hash".to_string()).unwrap();

        assert_eq!(ann.to_response().display_name, "Ann Lee");
        assert_eq!(bob.to_response().display_name, "bob");
    }

    #[test]
    fn test_restore_continues_ids() {
        let users = UserDirectory::new();
        let restored = vec![
            User {
                id: 4,
                username: "ann".to_string(),
                display_name: None,
                password_hash: "hash".to_string(),
            },
            User {
                id: 9,
                username: "bob".to_string(),
                display_name: None,
                password_hash: "hash".to_string(),
            },
        ];
        assert_eq!(users.restore(restored), 2);

        let cat = users.register("cat", None, "hash".to_string()).unwrap();
        assert_eq!(cat.id, 10);
        assert!(matches!(
            users.register("Bob", None, "hash".to_string()),
            Err(AppError::UsernameTaken(_))
        ));

        users.remove(cat.id);
        assert!(users.find_by_username("cat").is_none());
        assert_eq!(users.len(), 2);
    }
}
