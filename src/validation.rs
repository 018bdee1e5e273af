use std::sync::LazyLock;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::{
    error::ApiError,
    models::{
        CreateCommentRequest, CreatePostRequest, LoginRequest, RegisterUserRequest,
        UpdateCommentRequest, UpdatePostRequest, UpdateUserRequest,
    },
};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"));

/// Trims and lower-cases an email so lookups and the unique index see one canonical form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Validate
///
/// Request payloads check their own business rules once serde has accepted their shape.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

impl Validate for RegisterUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required(&self.name, "name")?;
        required(&self.email, "email")?;
        if !is_valid_email(&normalize_email(&self.email)) {
            return Err(ApiError::Validation("email must be a valid email".to_string()));
        }
        required(&self.password, "password")
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required(&self.email, "email")?;
        required(&self.password, "password")
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required(&self.name, "name")
    }
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required(&self.title, "title")?;
        required(&self.content, "content")
    }
}

impl Validate for UpdatePostRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.title.is_none() && self.content.is_none() {
            return Err(ApiError::Validation(
                "at least one of title or content is required".to_string(),
            ));
        }
        if let Some(title) = &self.title {
            required(title, "title")?;
        }
        if let Some(content) = &self.content {
            required(content, "content")?;
        }
        Ok(())
    }
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required(&self.comment, "comment")
    }
}

impl Validate for UpdateCommentRequest {
    fn validate(&self) -> Result<(), ApiError> {
        required(&self.comment, "comment")
    }
}

/// ValidJson
///
/// A `Json<T>` extractor that also runs `T::validate`. Malformed bodies and rule violations
/// both come back as `ApiError::Validation` in the error envelope instead of axum's plain-text
/// rejection.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
