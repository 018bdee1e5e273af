use std::any::Any;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    response::{IntoResponse, Response},
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod ownership;
pub mod password;
pub mod repository;
pub mod resources;
pub mod token;
pub mod validation;

// Routing segregated by access level (Public, Authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};
pub use token::{TokenService, TokenState};

/// ApiDoc
///
/// The OpenAPI document for every route and schema, served at `/api-docs/openapi.json` and
/// browsable through the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::register_user, handlers::login,
        handlers::get_all_users, handlers::update_user, handlers::delete_user,
        handlers::get_all_posts, handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::get_all_comments, handlers::get_comment, handlers::create_comment,
        handlers::update_comment, handlers::delete_comment
    ),
    components(
        schemas(
            models::User, models::Post, models::Comment, models::Status, models::Role,
            models::CommentWithAuthor, models::PostWithComments, models::PostWithDetails,
            models::UserWithPosts, models::RegisterUserRequest, models::LoginRequest,
            models::UpdateUserRequest, models::CreatePostRequest, models::UpdatePostRequest,
            models::CreateCommentRequest, models::UpdateCommentRequest, models::UsersData,
            models::NewUserData, models::UserData, models::LoginData, models::PostsData,
            models::NewPostData, models::PostData, models::CommentsData, models::NewCommentData,
            models::CommentData, error::ErrorBody,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "blog-api", description = "Blog API: users, posts and comments")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single immutable container shared by every request: the persistence layer, the
/// token service and the configuration it was built from.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub tokens: TokenState,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the token service from `config` so the signing secret is read exactly once.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let tokens = TokenState::new(TokenService::from_config(&config));
        Self {
            repo,
            tokens,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies global and scoped middleware, and registers the
/// application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API v1: public and session-guarded routes share paths (e.g. `/users`), so they are
    // merged before nesting.
    let api_v1 = public::public_routes().merge(authenticated::authenticated_routes(&state));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_v1)
        .fallback(handlers::not_found)
        .with_state(state);

    // 3. Observability, Correlation and Panic Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // Innermost: panics surface as a JSON 500 inside the request span.
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .layer(cors)
}

/// Turns a handler panic into the standard `Internal` error envelope.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// trace_span_logger
///
/// Builds the per-request span, tagged with the `x-request-id` so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
