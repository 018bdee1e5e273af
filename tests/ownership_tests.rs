mod common;

use axum::{
    Router,
    http::{Method, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
};
use blog_api::{
    auth::AuthUser,
    error::ApiError,
    models::{Comment, Post, Role, Status, User},
    ownership::{AccessPolicy, OwnedResource, ensure_access, protect_owner},
};
use common::{InMemoryRepository, bearer, request, send, test_app, test_state};
use serde_json::json;
use uuid::Uuid;

fn auth(id: Uuid, role: Role) -> AuthUser {
    AuthUser {
        id,
        name: "someone".to_string(),
        email: "someone@x.com".to_string(),
        role,
    }
}

// --- ensure_access ---

#[test]
fn test_policies_per_resource_kind() {
    assert_eq!(User::POLICY, AccessPolicy::OwnerOnly);
    assert_eq!(Post::POLICY, AccessPolicy::OwnerOrAdmin);
    assert_eq!(Comment::POLICY, AccessPolicy::OwnerOrAdmin);
}

#[test]
fn test_owner_is_allowed() {
    let owner = Uuid::new_v4();
    let post = Post {
        user_id: owner,
        ..Post::default()
    };
    assert!(ensure_access(&auth(owner, Role::Normal), &post).is_ok());
}

#[test]
fn test_non_owner_is_forbidden() {
    let post = Post {
        user_id: Uuid::new_v4(),
        ..Post::default()
    };
    let err = ensure_access(&auth(Uuid::new_v4(), Role::Normal), &post).unwrap_err();

    assert!(matches!(err, ApiError::Forbidden("post")));
    assert_eq!(err.to_string(), "You are not the owner of this post");
}

#[test]
fn test_admin_may_moderate_posts_and_comments() {
    let admin = auth(Uuid::new_v4(), Role::Admin);
    let post = Post {
        user_id: Uuid::new_v4(),
        ..Post::default()
    };
    let comment = Comment {
        user_id: Uuid::new_v4(),
        ..Comment::default()
    };

    assert!(ensure_access(&admin, &post).is_ok());
    assert!(ensure_access(&admin, &comment).is_ok());
}

#[test]
fn test_admin_cannot_touch_other_accounts() {
    let admin = auth(Uuid::new_v4(), Role::Admin);
    let account = User {
        id: Uuid::new_v4(),
        status: Status::Active,
        ..User::default()
    };

    let err = ensure_access(&admin, &account).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden("account")));
}

// --- Ownership Guard through the router ---

#[tokio::test]
async fn test_user_cannot_update_someone_elses_post() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let x = repo.seed_user("X", "x@x.com", Role::Normal);
    let y = repo.seed_user("Y", "y@x.com", Role::Normal);
    let ys_post = repo.seed_post(&y, "Y's post");
    let xs_post = repo.seed_post(&x, "X's post");
    let auth_x = bearer(&state, x.id);

    let (status, body) = send(
        &app,
        request(
            Method::PATCH,
            &format!("/api/v1/posts/{}", ys_post.id),
            Some(&auth_x),
            Some(json!({ "title": "Hijacked" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You are not the owner of this post");
    assert_eq!(repo.post(ys_post.id).unwrap().title, "Y's post");

    let (status, body) = send(
        &app,
        request(
            Method::PATCH,
            &format!("/api/v1/posts/{}", xs_post.id),
            Some(&auth_x),
            Some(json!({ "title": "Edited" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["post"]["title"], "Edited");
}

#[tokio::test]
async fn test_user_cannot_delete_someone_elses_comment() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let x = repo.seed_user("X", "x@x.com", Role::Normal);
    let y = repo.seed_user("Y", "y@x.com", Role::Normal);
    let post = repo.seed_post(&y, "post");
    let comment = repo.seed_comment(&y, &post, "mine");

    let (status, _) = send(
        &app,
        request(
            Method::DELETE,
            &format!("/api/v1/comments/{}", comment.id),
            Some(&bearer(&state, x.id)),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(repo.comment(comment.id).unwrap().status, Status::Active);
}

#[tokio::test]
async fn test_admin_can_delete_any_comment() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let admin = repo.seed_user("Root", "root@x.com", Role::Admin);
    let y = repo.seed_user("Y", "y@x.com", Role::Normal);
    let post = repo.seed_post(&y, "post");
    let comment = repo.seed_comment(&y, &post, "spam");

    let (status, _) = send(
        &app,
        request(
            Method::DELETE,
            &format!("/api/v1/comments/{}", comment.id),
            Some(&bearer(&state, admin.id)),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(repo.comment(comment.id).unwrap().status, Status::Deleted);
}

#[tokio::test]
async fn test_admin_cannot_delete_another_account() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let admin = repo.seed_user("Root", "root@x.com", Role::Admin);
    let y = repo.seed_user("Y", "y@x.com", Role::Normal);

    let (status, body) = send(
        &app,
        request(
            Method::DELETE,
            &format!("/api/v1/users/{}", y.id),
            Some(&bearer(&state, admin.id)),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You are not the owner of this account");
    assert_eq!(repo.user(y.id).unwrap().status, Status::Active);
}

#[tokio::test]
async fn test_existence_is_checked_before_ownership() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let x = repo.seed_user("X", "x@x.com", Role::Normal);
    let auth_x = bearer(&state, x.id);

    let (status, body) = send(
        &app,
        request(
            Method::DELETE,
            &format!("/api/v1/posts/{}", Uuid::new_v4()),
            Some(&auth_x),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, _) = send(
        &app,
        request(Method::DELETE, "/api/v1/posts/not-a-uuid", Some(&auth_x), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_deleted_post_is_not_found() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let x = repo.seed_user("X", "x@x.com", Role::Normal);
    let post = repo.seed_post(&x, "gone soon");
    let auth_x = bearer(&state, x.id);

    let uri = format!("/api/v1/posts/{}", post.id);
    let (status, _) = send(&app, request(Method::DELETE, &uri, Some(&auth_x), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request(Method::DELETE, &uri, Some(&auth_x), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_reads_skip_the_ownership_guard() {
    let repo = InMemoryRepository::new();
    let (state, app) = test_app(&repo);
    let x = repo.seed_user("X", "x@x.com", Role::Normal);
    let y = repo.seed_user("Y", "y@x.com", Role::Normal);
    let post = repo.seed_post(&y, "post");
    let comment = repo.seed_comment(&y, &post, "hello");

    let (status, body) = send(
        &app,
        request(
            Method::GET,
            &format!("/api/v1/comments/{}", comment.id),
            Some(&bearer(&state, x.id)),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["comment"]["comment"], "hello");
}

#[tokio::test]
async fn test_guard_without_bound_resource_is_internal_error() {
    let repo = InMemoryRepository::new();
    let state = test_state(&repo);
    let x = repo.seed_user("X", "x@x.com", Role::Normal);
    let auth_x = bearer(&state, x.id);

    // Wired without the existence layer in front.
    let app = Router::new()
        .route("/unguarded", get(|| async { "should not run" }))
        .route_layer(from_fn_with_state(state.clone(), protect_owner::<Post>))
        .with_state(state);

    let (status, body) = send(&app, request(Method::GET, "/unguarded", Some(&auth_x), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Something went wrong");
}
