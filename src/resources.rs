//! Existence checks for `/{id}` routes.
//!
//! Each middleware loads the active record named by the path, rejects with `NotFound` when
//! there is none, and binds the loaded record into the request extensions. The Ownership
//! Guard and the handler read it from there instead of querying again.
//!
//! A comment whose post has been deleted is reported as missing.

use axum::{
    extract::{Path, Request, State, rejection::PathRejection},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// An id that is not a UUID cannot name an existing record.
fn target_id(path: Result<Path<Uuid>, PathRejection>, kind: &'static str) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(error = %rejection, "unparseable resource id");
        ApiError::NotFound(kind)
    })
}

pub async fn user_exists(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let id = target_id(path, "User")?;
    let user = state
        .repo
        .find_active_user(id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub async fn post_exists(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let id = target_id(path, "Post")?;
    let post = state
        .repo
        .find_active_post(id)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    request.extensions_mut().insert(post);
    Ok(next.run(request).await)
}

pub async fn comment_exists(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let id = target_id(path, "Comment")?;
    let comment = state
        .repo
        .find_active_comment(id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    if state.repo.find_active_post(comment.post_id).await?.is_none() {
        tracing::debug!(comment_id = %comment.id, "comment belongs to a deleted post");
        return Err(ApiError::NotFound("Comment"));
    }

    request.extensions_mut().insert(comment);
    Ok(next.run(request).await)
}
