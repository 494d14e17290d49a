//! Argon2id password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),
    #[error("Failed to verify password: {0}")]
    VerifyError(String),
    #[error("Invalid password hash format")]
    InvalidHash,
    #[error("Password worker failed: {0}")]
    Worker(String),
}

/// Hash as a PHC string (`$argon2id$...`).
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// A user created without a password has no hash and can never log in.
pub fn check_login_password(password: &str, stored: Option<&str>) -> Result<bool, PasswordError> {
    match stored {
        Some(hash) => verify_password(password, hash),
        None => Ok(false),
    }
}

/// [`hash_password`] on the blocking pool; argon2 is too slow for a runtime worker.
pub async fn hash_password_off_thread(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
}

/// [`check_login_password`] on the blocking pool.
pub async fn check_login_password_off_thread(password: String, stored: Option<String>) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || check_login_password(&password, stored.as_deref()))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
}
