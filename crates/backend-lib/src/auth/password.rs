// ============================
// studyroom-backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use rand::RngCore;
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroize;

use crate::config::{PasswordHashSettings, PasswordRequirements};
use crate::error::AppError;

const SALT_BYTES: usize = 16;

/// Hash a password using scrypt, returning a PHC string
pub fn hash_password(plain: &str, settings: &PasswordHashSettings) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;

    let params = Params::new(settings.log_n, 8, 1, Params::RECOMMENDED_LEN)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash. Cost parameters come from the hash itself.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

/// Hash a password and zeroize the original
pub fn hash_password_secure(
    plain: &mut String,
    settings: &PasswordHashSettings,
) -> Result<String, AppError> {
    let hash = hash_password(plain, settings);
    plain.zeroize();
    hash
}
