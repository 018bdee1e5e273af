use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// ApiError
///
/// The complete failure taxonomy of the API. Every handler, extractor and middleware returns
/// `Result<_, ApiError>`, and the `IntoResponse` impl below is the single boundary that turns
/// a failure into the `{status: "error", message}` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, expired or tampered token, or the session owner is no longer active.
    #[error("{0}")]
    Unauthenticated(&'static str),
    /// Authenticated, but not allowed to touch the target resource.
    #[error("You are not the owner of this {0}")]
    Forbidden(&'static str),
    /// Login failure. Identical for unknown emails and wrong passwords.
    #[error("Wrong credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Anything unexpected. The detail is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidCredentials | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that is safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

/// ErrorBody
///
/// The error envelope returned on every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "error")]
    pub status: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        (status, Json(ErrorBody::new(self.public_message()))).into_response()
    }
}

/// RepoError
///
/// Failures surfaced by the persistence layer. Unique-constraint violations are kept apart
/// so the registration handler can report them as `DuplicateEmail`.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return RepoError::UniqueViolation(db_err.message().to_string());
            }
        }
        RepoError::Database(err)
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
