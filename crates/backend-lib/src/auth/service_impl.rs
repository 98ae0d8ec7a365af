use async_trait::async_trait;
use std::sync::Arc;
use studyroom_common::{LoginRequest, RegisterRequest, TokenResponse, UserResponse};
use zeroize::Zeroize;

use super::password::{hash_password_secure, validate_password_strength, verify_password};
use super::{AuthService, SessionManager, UserDirectory, UserIdentity};
use crate::config::{PasswordHashSettings, PasswordRequirements};
use crate::error::AppError;
use crate::storage::Storage;
use crate::validation::{self, ValidationError};

pub struct DefaultAuth {
    users: Arc<UserDirectory>,
    storage: Arc<dyn Storage>,
    sessions: SessionManager,
    requirements: PasswordRequirements,
    hash_settings: PasswordHashSettings,
}

impl DefaultAuth {
    pub fn new(
        users: Arc<UserDirectory>,
        storage: Arc<dyn Storage>,
        sessions: SessionManager,
        requirements: PasswordRequirements,
        hash_settings: PasswordHashSettings,
    ) -> Self {
        Self {
            users,
            storage,
            sessions,
            requirements,
            hash_settings,
        }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn register(&self, req: RegisterRequest) -> Result<UserResponse, AppError> {
        let RegisterRequest {
            username,
            mut password,
            display_name,
        } = req;

        validation::validate_username(&username)?;
        if let Some(name) = &display_name {
            validation::validate_display_name(name)?;
        }
        if !validate_password_strength(&password, &self.requirements) {
            password.zeroize();
            return Err(ValidationError::InvalidPassword(format!(
                "must be at least {} characters and meet the configured complexity rules",
                self.requirements.min_length
            ))
            .into());
        }
        if self.users.find_by_username(&username).is_some() {
            password.zeroize();
            return Err(AppError::UsernameTaken(username));
        }

        let settings = self.hash_settings.clone();
        let hash = tokio::task::spawn_blocking(move || hash_password_secure(&mut password, &settings))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        let user = self.users.register(&username, display_name, hash)?;
        if let Err(e) = self.storage.save_user(&user).await {
            // An id that never reached disk must not stay claimed
            self.users.remove(user.id);
            tracing::error!(user_id = user.id, error = %e, "failed to persist user");
            return Err(e);
        }
        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user.to_response())
    }

    async fn login(&self, req: LoginRequest) -> Result<TokenResponse, AppError> {
        let LoginRequest {
            username,
            mut password,
        } = req;

        let Some(user) = self.users.find_by_username(&username) else {
            password.zeroize();
            tracing::warn!(username = %username, "login for unknown user");
            return Err(AppError::InvalidCredentials);
        };

        let hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || {
            let ok = verify_password(&hash, &password);
            password.zeroize();
            ok
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

        if !verified {
            tracing::warn!(user_id = user.id, "login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.sessions.create_session(user.id, user.username).await;
        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.sessions.ttl().as_secs(),
        })
    }

    async fn resolve(&self, token: &str) -> Result<UserIdentity, AppError> {
        let session = self
            .sessions
            .resolve(token)
            .await
            .ok_or(AppError::Unauthenticated)?;
        Ok(UserIdentity {
            user_id: session.user_id,
            username: session.username,
        })
    }
}
