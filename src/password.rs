use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hash a password with Argon2id and a random per-password salt. Returns a PHC string.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a PHC string. `Ok(false)` means mismatch.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

// Argon2 is CPU-bound: both wrappers run on the blocking pool.

pub async fn hash_password_blocking(plain: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

// Same parameters as a stored hash, so a check against it costs the same as a real one.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("dummy-password-never-matches").unwrap_or_default());

/// verify_dummy_blocking
///
/// Runs a full Argon2 verification against a throwaway hash and discards the outcome. Used
/// when there is no stored hash to check, so that path takes as long as a real mismatch.
pub async fn verify_dummy_blocking(plain: String) {
    let hash = DUMMY_HASH.clone();
    if let Err(e) = verify_password_blocking(plain, hash).await {
        tracing::error!(error = %e, "dummy password verification failed");
    }
}
