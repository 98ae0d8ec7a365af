// ============================
// studyroom-backend-lib/src/auth/session.rs
// ============================
//! Session token handling and management.
use metrics::{counter, gauge};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};
use studyroom_common::UserId;
use tokio::sync::RwLock;

use super::token_generator::generate_secure_token;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};

/// Session information
#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

/// Session manager for handling bearer tokens
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        SessionManager {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a new session and return its token
    pub async fn create_session(&self, user_id: UserId, username: String) -> String {
        let token = generate_secure_token();
        let now = SystemTime::now();
        let session = Session {
            user_id,
            username,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        token
    }

    /// Live session for `token`; expired sessions are treated as absent
    pub async fn resolve(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|session| SystemTime::now() < session.expires_at)
            .cloned()
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = SystemTime::now();
        let before_count = sessions.len();

        sessions.retain(|_, session| now < session.expires_at);

        let removed = before_count - sessions.len();
        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
            tracing::debug!(removed, "expired sessions removed");
        }
        removed
    }

    /// Run `cleanup_expired` forever on a fixed interval
    pub async fn cleanup_task(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            self.cleanup_expired().await;
        }
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
