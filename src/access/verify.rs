//! Password hashing and login credential validation.

use crate::access::session::GLOBAL_SESSION_KEY;
use crate::error::AppError;
use crate::models::PasswordMode;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;

/// Why a login attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("Password field is required.")]
    MissingPassword,

    #[error("Incorrect password")]
    IncorrectPassword,
}

/// Check `plain` against an argon2 PHC hash.
///
/// A missing or malformed hash never verifies.
pub fn verify_password(plain: &str, hash: Option<&str>) -> bool {
    let Some(hash) = hash else {
        return false;
    };
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hash a password into an argon2id PHC string with a random salt.
pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Validate a submitted password for the page the form was rendered for.
///
/// Returns the session key to unlock: `pinned_page_id`, or
/// [`GLOBAL_SESSION_KEY`] when only the global password is accepted.
pub fn validate(
    submitted: &str,
    pinned_page_id: u64,
    page_hash: Option<&str>,
    mode: PasswordMode,
    global_hash: Option<&str>,
) -> Result<u64, LoginError> {
    if submitted.is_empty() {
        return Err(LoginError::MissingPassword);
    }

    match mode {
        PasswordMode::PerPage => {
            if verify_password(submitted, page_hash) {
                Ok(pinned_page_id)
            } else {
                Err(LoginError::IncorrectPassword)
            }
        }
        PasswordMode::PerPageOrGlobal => {
            if verify_password(submitted, page_hash) || verify_password(submitted, global_hash) {
                Ok(pinned_page_id)
            } else {
                Err(LoginError::IncorrectPassword)
            }
        }
        PasswordMode::GlobalOnly => {
            if verify_password(submitted, global_hash) {
                Ok(GLOBAL_SESSION_KEY)
            } else {
                Err(LoginError::IncorrectPassword)
            }
        }
    }
}
