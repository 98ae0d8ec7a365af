use async_trait::async_trait;
use studyroom_common::{LoginRequest, RegisterRequest, TokenResponse, UserId, UserResponse};

use crate::error::AppError;

/// Who a bearer token belongs to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub username: String,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, req: RegisterRequest) -> Result<UserResponse, AppError>;
    async fn login(&self, req: LoginRequest) -> Result<TokenResponse, AppError>;
    async fn resolve(&self, token: &str) -> Result<UserIdentity, AppError>;
}
