use crate::{
    AppState,
    auth::require_session,
    handlers,
    models::{Comment, Post, User},
    ownership::protect_owner,
    resources::{comment_exists, post_exists, user_exists},
};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch},
};

/// Authenticated Router Module
///
/// Every route here sits behind the Session Guard (`require_session`), applied last so it is the
/// outermost layer. Resource-scoped routes then run, in order:
/// 1. the existence check (`*_exists`), which binds the target into the request extensions;
/// 2. for mutations, the Ownership Guard (`protect_owner::<R>`) on that bound target.
///
/// Route layers run outermost-first, so each chain adds the ownership layer before the
/// existence layer.
pub fn authenticated_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(user_routes(state))
        .merge(post_routes(state))
        .merge(comment_routes(state))
        .route_layer(from_fn_with_state(state.clone(), require_session))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // GET /users
        // Active users with their posts and comments.
        .route("/users", get(handlers::get_all_users))
        // PATCH/DELETE /users/{id}
        // Account holder only; admins get no override here.
        .route(
            "/users/{id}",
            patch(handlers::update_user)
                .delete(handlers::delete_user)
                .route_layer(from_fn_with_state(state.clone(), protect_owner::<User>))
                .route_layer(from_fn_with_state(state.clone(), user_exists)),
        )
}

fn post_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // GET/POST /posts
        .route(
            "/posts",
            get(handlers::get_all_posts).post(handlers::create_post),
        )
        // PATCH/DELETE /posts/{id}
        // Author or admin.
        .route(
            "/posts/{id}",
            patch(handlers::update_post)
                .delete(handlers::delete_post)
                .route_layer(from_fn_with_state(state.clone(), protect_owner::<Post>))
                .route_layer(from_fn_with_state(state.clone(), post_exists)),
        )
}

fn comment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // GET/POST /comments
        .route(
            "/comments",
            get(handlers::get_all_comments).post(handlers::create_comment),
        )
        // GET /comments/{id} needs only the existence check; PATCH/DELETE also need the author
        // (or an admin). The ownership layer is attached before `get` is added so reads skip it.
        .route(
            "/comments/{id}",
            patch(handlers::update_comment)
                .delete(handlers::delete_comment)
                .route_layer(from_fn_with_state(state.clone(), protect_owner::<Comment>))
                .get(handlers::get_comment)
                .route_layer(from_fn_with_state(state.clone(), comment_exists)),
        )
}
