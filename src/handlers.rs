use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody, RepoError},
    models::{
        Comment, CommentData, CommentsData, CreateCommentRequest, CreatePostRequest, Envelope,
        LoginData, LoginRequest, NewCommentData, NewPostData, NewUser, NewUserData, Post,
        PostData, PostsData, RegisterUserRequest, UpdateCommentRequest, UpdatePostRequest,
        UpdateUserRequest, User, UserData, UsersData,
    },
    password::{hash_password_blocking, verify_dummy_blocking, verify_password_blocking},
    validation::{ValidJson, normalize_email},
};

type JsonResult<T> = Result<Json<Envelope<T>>, ApiError>;
type CreatedResult<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

fn created<T>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope::success(data)))
}

// --- Public Handlers ---

/// health
///
/// Liveness probe for load balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// register_user
///
/// [Public Route] Creates an `active` account with the `normal` role.
///
/// The email is stored trimmed and lower-cased and the password only as an Argon2 hash. A
/// second registration with the same email, including one belonging to a soft-deleted account,
/// is rejected by the unique index and reported as `DuplicateEmail`.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Account created; envelope data is `{ newUser }`", body = NewUserData),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterUserRequest>,
) -> CreatedResult<NewUserData> {
    let email = normalize_email(&payload.email);
    let password_hash = hash_password_blocking(payload.password).await?;

    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email,
        password_hash,
    };

    let user = state.repo.create_user(new_user).await.map_err(|e| match e {
        RepoError::UniqueViolation(_) => ApiError::DuplicateEmail,
        other => other.into(),
    })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(created(NewUserData { new_user: user }))
}

/// login
///
/// [Public Route] Exchanges credentials for a session token.
///
/// Unknown emails, deleted accounts and wrong passwords all produce the same
/// `InvalidCredentials` response. Nothing is written.
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; envelope data is `{ user, token }`", body = LoginData),
        (status = 400, description = "Wrong credentials", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> JsonResult<LoginData> {
    let email = normalize_email(&payload.email);

    let Some(user) = state.repo.find_active_user_by_email(&email).await? else {
        tracing::debug!("login attempt for unknown or inactive email");
        verify_dummy_blocking(payload.password).await;
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password_blocking(payload.password, user.password.clone()).await? {
        tracing::warn!(user_id = %user.id, "login attempt with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(Envelope::success(LoginData { user, token })))
}

// --- User Handlers ---

/// get_all_users
///
/// [Authenticated Route] Active users with their posts (and those posts' comments) and their
/// own comments.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Envelope data is `{ users }`", body = UsersData),
        (status = 401, description = "No valid session", body = ErrorBody)
    )
)]
pub async fn get_all_users(State(state): State<AppState>) -> JsonResult<UsersData> {
    let users = state.repo.users_with_posts().await?;
    Ok(Json(Envelope::success(UsersData { users })))
}

/// update_user
///
/// [Authenticated Route] Renames the account. Only the holder may do this; the target was
/// loaded by `user_exists` and cleared by the Ownership Guard before this runs.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Envelope data is `{ user }`", body = UserData),
        (status = 403, description = "Not the account holder", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(target): Extension<User>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> JsonResult<UserData> {
    let user = state
        .repo
        .update_user_name(target.id, payload.name.trim())
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(Envelope::success(UserData { user })))
}

/// delete_user
///
/// [Authenticated Route] Soft-deletes the account. Every token issued to it stops working on
/// the next request.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the account holder", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(target): Extension<User>,
) -> Result<StatusCode, ApiError> {
    if !state.repo.soft_delete_user(target.id).await? {
        return Err(ApiError::NotFound("User"));
    }
    tracing::info!(user_id = %target.id, "user soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Post Handlers ---

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Envelope data is `{ posts }`", body = PostsData))
)]
pub async fn get_all_posts(State(state): State<AppState>) -> JsonResult<PostsData> {
    let posts = state.repo.posts_with_details().await?;
    Ok(Json(Envelope::success(PostsData { posts })))
}

/// create_post
///
/// [Authenticated Route] The author is always the session user; the body cannot pick one.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    security(("bearer_auth" = [])),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Envelope data is `{ newPost }`", body = NewPostData),
        (status = 400, description = "Invalid payload", body = ErrorBody)
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser { id: user_id, .. }: AuthUser,
    ValidJson(payload): ValidJson<CreatePostRequest>,
) -> CreatedResult<NewPostData> {
    let payload = CreatePostRequest {
        title: payload.title.trim().to_string(),
        content: payload.content.trim().to_string(),
    };
    let new_post = state.repo.create_post(user_id, payload).await?;
    Ok(created(NewPostData { new_post }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/posts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Envelope data is `{ post }`", body = PostData),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody)
    )
)]
pub async fn update_post(
    State(state): State<AppState>,
    Extension(target): Extension<Post>,
    ValidJson(payload): ValidJson<UpdatePostRequest>,
) -> JsonResult<PostData> {
    let payload = UpdatePostRequest {
        title: payload.title.map(|t| t.trim().to_string()),
        content: payload.content.map(|c| c.trim().to_string()),
    };
    let post = state
        .repo
        .update_post(target.id, payload)
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(Envelope::success(PostData { post })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "Post id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Post not found", body = ErrorBody)
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(target): Extension<Post>,
) -> Result<StatusCode, ApiError> {
    if !state.repo.soft_delete_post(target.id).await? {
        return Err(ApiError::NotFound("Post"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Comment Handlers ---

#[utoipa::path(
    get,
    path = "/api/v1/comments",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Envelope data is `{ comments }`", body = CommentsData))
)]
pub async fn get_all_comments(State(state): State<AppState>) -> JsonResult<CommentsData> {
    let comments = state.repo.comments_with_authors().await?;
    Ok(Json(Envelope::success(CommentsData { comments })))
}

/// get_comment
///
/// [Authenticated Route] Returns the comment `comment_exists` already loaded.
#[utoipa::path(
    get,
    path = "/api/v1/comments/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Envelope data is `{ comment }`", body = CommentData),
        (status = 404, description = "Comment not found", body = ErrorBody)
    )
)]
pub async fn get_comment(Extension(comment): Extension<Comment>) -> Json<Envelope<CommentData>> {
    Json(Envelope::success(CommentData { comment }))
}

/// create_comment
///
/// [Authenticated Route] Comments can only be attached to an active post.
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    security(("bearer_auth" = [])),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Envelope data is `{ newComment }`", body = NewCommentData),
        (status = 404, description = "Post not found", body = ErrorBody)
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser { id: user_id, .. }: AuthUser,
    ValidJson(payload): ValidJson<CreateCommentRequest>,
) -> CreatedResult<NewCommentData> {
    if state.repo.find_active_post(payload.post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post"));
    }

    let new_comment = state.repo.create_comment(user_id, payload).await?;
    Ok(created(NewCommentData { new_comment }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/comments/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "Comment id")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Envelope data is `{ comment }`", body = CommentData),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Comment not found", body = ErrorBody)
    )
)]
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(target): Extension<Comment>,
    ValidJson(payload): ValidJson<UpdateCommentRequest>,
) -> JsonResult<CommentData> {
    let comment = state
        .repo
        .update_comment(target.id, payload.comment.trim())
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    Ok(Json(Envelope::success(CommentData { comment })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    security(("bearer_auth" = [])),
    params(("id" = uuid::Uuid, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Comment not found", body = ErrorBody)
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(target): Extension<Comment>,
) -> Result<StatusCode, ApiError> {
    if !state.repo.soft_delete_comment(target.id).await? {
        return Err(ApiError::NotFound("Comment"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// not_found
///
/// Router fallback, so unknown routes also answer with the error envelope.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route")
}
