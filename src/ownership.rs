use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{Comment, Post, User},
};

/// Who, besides the owner, may act on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    OwnerOnly,
    /// Admins may moderate resources they do not own.
    OwnerOrAdmin,
}

/// OwnedResource
///
/// Anything the Ownership Guard can protect. One generic guard serves every resource kind;
/// a kind only declares who owns an instance and which policy applies.
pub trait OwnedResource: Clone + Send + Sync + 'static {
    /// Used in the forbidden message: "You are not the owner of this {KIND}".
    const KIND: &'static str;
    const POLICY: AccessPolicy;

    fn owner_id(&self) -> Uuid;
}

// A user owns their own account.
impl OwnedResource for User {
    const KIND: &'static str = "account";
    const POLICY: AccessPolicy = AccessPolicy::OwnerOnly;

    fn owner_id(&self) -> Uuid {
        self.id
    }
}

impl OwnedResource for Post {
    const KIND: &'static str = "post";
    const POLICY: AccessPolicy = AccessPolicy::OwnerOrAdmin;

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl OwnedResource for Comment {
    const KIND: &'static str = "comment";
    const POLICY: AccessPolicy = AccessPolicy::OwnerOrAdmin;

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// ensure_access
///
/// The ownership predicate: identities are compared by value, never by reference or textual
/// form.
pub fn ensure_access<R: OwnedResource>(user: &AuthUser, resource: &R) -> Result<(), ApiError> {
    if resource.owner_id() == user.id {
        return Ok(());
    }
    match R::POLICY {
        AccessPolicy::OwnerOrAdmin if user.is_admin() => {
            tracing::info!(admin_id = %user.id, kind = R::KIND, "admin override");
            Ok(())
        }
        _ => Err(ApiError::Forbidden(R::KIND)),
    }
}

/// protect_owner
///
/// Route-layer middleware (the Ownership Guard). It must run after the Session Guard and after
/// the existence check that binds the target `R` into the request extensions.
///
/// A missing binding is a wiring error, reported as `Internal`.
pub async fn protect_owner<R: OwnedResource>(
    auth: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    {
        let resource = request.extensions().get::<R>().ok_or_else(|| {
            ApiError::Internal(format!("ownership guard ran without a bound {}", R::KIND))
        })?;
        ensure_access(&auth, resource)?;
    }
    Ok(next.run(request).await)
}
