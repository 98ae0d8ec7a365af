// ============================
// studyroom-backend-lib/src/auth/mod.rs
// ============================
//! Authentication: users, passwords, bearer sessions.

mod extractor;
pub mod password;
mod service;
mod service_impl;
pub mod session;
pub mod token_generator;
pub mod users;

pub use extractor::{bearer_token, AuthUser};
pub use service::{AuthService, UserIdentity};
pub use service_impl::DefaultAuth;
pub use session::{Session, SessionManager};
pub use users::{User, UserDirectory};
