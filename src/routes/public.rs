use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Public Router Module
///
/// The only API routes that work without a bearer token. Mounted under `/api/v1`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /users
        // Registration. The new account starts `active` with the `normal` role.
        .route("/users", post(handlers::register_user))
        // POST /users/login
        // Returns the user and a session token valid for the configured TTL.
        .route("/users/login", post(handlers::login))
}
