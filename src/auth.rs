use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
    token::TokenState,
};

const BEARER_PREFIX: &str = "Bearer ";

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request: the session owner's current record,
/// as loaded from the Credential Store. It never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Used by the Ownership Guard for admin moderation.
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// bearer_token
///
/// Pulls the raw token out of `Authorization: Bearer <token>`. Any other shape (missing header,
/// non-ASCII value, another scheme, empty token) yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// AuthUser Extractor Implementation (the Session Guard)
///
/// Makes `AuthUser` usable as a function argument in any handler or middleware. The process:
/// 1. Cache: if an earlier layer already resolved the identity for this request, reuse it.
/// 2. Token: extract the bearer token and verify its signature and expiry.
/// 3. Lookup: load the owner by id; only `active` users pass.
/// 4. Bind: store the identity in the request extensions for everything downstream.
///
/// Rejection: `ApiError::Unauthenticated` (401) on any failure, with no partial context bound.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. One Credential Store lookup per request, however many layers ask.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        // 2. Token Extraction & Verification
        let token =
            bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated("Invalid session"))?;

        let tokens = TokenState::from_ref(state);
        let user_id = tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            ApiError::Unauthenticated("Invalid session")
        })?;

        // 3. Database Lookup
        // A deleted owner invalidates every outstanding session at once.
        let repo = RepositoryState::from_ref(state);
        let user = repo
            .find_active_user(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated(
                "The owner of the session is no longer active",
            ))?;

        // 4. Bind
        let auth = AuthUser::from(user);
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

/// require_session
///
/// Route-layer middleware that enforces the Session Guard for a whole router. Since the
/// extractor binds the identity into the request extensions, handlers and the Ownership Guard
/// further down reuse it without a second lookup.
pub async fn require_session(_auth: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}
