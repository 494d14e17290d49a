//! Opaque API tokens. Only the SHA-256 digest is ever stored.

use axum::http::HeaderValue;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Keys are 20 random bytes, hex encoded.
pub const KEY_LEN: usize = 40;

pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the key out of `Authorization: Token <key>`.
///
/// `Ok(None)` when the header is absent or uses another scheme; an error when the
/// `Token` scheme is present but malformed.
pub fn key_from_header(value: Option<&HeaderValue>) -> Result<Option<String>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid token header. Token string should not contain invalid characters.".into()))?;
    let mut parts = raw.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("token") => {}
        _ => return Ok(None),
    }
    let key = parts
        .next()
        .ok_or_else(|| AppError::Unauthorized("Invalid token header. No credentials provided.".into()))?;
    if parts.next().is_some() {
        return Err(AppError::Unauthorized(
            "Invalid token header. Token string should not contain spaces.".into(),
        ));
    }
    Ok(Some(key.to_string()))
}
