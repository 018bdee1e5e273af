use std::{sync::Arc, time::Duration};

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;

/// Claims
///
/// The payload of a session token. It is self-contained: nothing about a session is stored
/// server-side, so the only way a token stops working early is its owner leaving `active`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The id of the user the session belongs to.
    pub id: Uuid,
    /// Issued At: unix timestamp of issuance.
    pub iat: usize,
    /// Expiration Time: the token must not be accepted after this unix timestamp.
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed payload or expired.
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// TokenService
///
/// Issues and verifies HS256 session tokens. Built once at startup from the immutable
/// `AppConfig`, then shared read-only across requests.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

/// The concrete type used to share the token service across the application state.
pub type TokenState = Arc<TokenService>;

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let minutes = config.token_ttl_minutes.max(1) as u64;
        Self::new(&config.jwt_secret, Duration::from_secs(minutes * 60))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// issue
    ///
    /// Signs a token for `user_id` that expires `ttl` from now.
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            id: user_id,
            iat: now,
            exp: now + self.ttl.as_secs() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        tracing::debug!(user_id = %user_id, "session token issued");
        Ok(token)
    }

    /// verify
    ///
    /// Checks signature integrity and expiry and returns the user id the token was issued to.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // A token is dead the second its `exp` passes.
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(TokenError::Invalid)?;
        Ok(data.claims.id)
    }
}
