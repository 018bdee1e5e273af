use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations (Mapped to Postgres enum types) ---

/// Status
///
/// Soft-delete flag shared by users, posts and comments (`record_status` in Postgres).
/// Rows are never removed; `Deleted` rows are invisible to every `active`-filtered lookup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "record_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Status {
    #[default]
    Active,
    Deleted,
}

/// Role
///
/// The RBAC field (`user_role` in Postgres). `Admin` may moderate posts and comments it does
/// not own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Normal,
    Admin,
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The credential record from the `users` table. The password hash is loaded for login
/// verification but is never serialized into a response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // Argon2 PHC string.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password: String,
    pub status: Status,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Post
///
/// A blog post from the `posts` table, owned by its author (`user_id`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub user_id: Uuid,
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// A comment on a post from the `comments` table, owned by its author (`user_id`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub comment: String,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Internal insert payload; the password has already been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

// --- Read Models (explicitly assembled, no dynamic eager loading) ---

/// CommentWithAuthor
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: User,
}

/// PostWithComments
///
/// A post as listed under its author: the author is implied, so only comments are attached.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentWithAuthor>,
}

/// PostWithDetails
///
/// A post with its author and its comments, used by the post listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostWithDetails {
    #[serde(flatten)]
    pub post: Post,
    pub user: User,
    pub comments: Vec<CommentWithAuthor>,
}

/// UserWithPosts
///
/// A user with their posts (each with comments and comment authors) and their own comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserWithPosts {
    #[serde(flatten)]
    pub user: User,
    pub posts: Vec<PostWithComments>,
    pub comments: Vec<Comment>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for account creation (POST /api/v1/users). The plaintext password only
/// lives long enough to be hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub name: String,
    #[schema(example = "a@x.com")]
    pub email: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// UpdateUserRequest
///
/// Only the display name may be changed through the profile update route.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub name: String,
}

/// CreatePostRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

/// UpdatePostRequest
///
/// Partial update payload; omitted fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommentRequest {
    pub comment: String,
    pub post_id: Uuid,
}

/// UpdateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateCommentRequest {
    pub comment: String,
}

// --- Response Payloads (Output Schemas) ---

/// Envelope
///
/// The success envelope wrapping every JSON response body: `{status: "success", data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsersData {
    pub users: Vec<UserWithPosts>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUserData {
    pub new_user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserData {
    pub user: User,
}

/// LoginData
///
/// Successful login: the sanitized user plus the freshly issued session token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginData {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostsData {
    pub posts: Vec<PostWithDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPostData {
    pub new_post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostData {
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentsData {
    pub comments: Vec<CommentWithAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentData {
    pub new_comment: Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentData {
    pub comment: Comment,
}
