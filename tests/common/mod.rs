#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use blog_api::{
    AppState, create_router,
    config::AppConfig,
    error::RepoError,
    models::{
        Comment, CreateCommentRequest, CreatePostRequest, NewUser, Post, Role, Status,
        UpdatePostRequest, User,
    },
    repository::{Repository, RepositoryState},
};
use chrono::Utc;
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tower::ServiceExt;
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

/// A `Repository` backed by plain vectors. Behaves like the Postgres implementation for
/// everything the handlers can observe: soft deletes, `active` filtering and the email
/// uniqueness constraint (deleted accounts included).
#[derive(Default)]
pub struct InMemoryRepository {
    users: Mutex<Vec<User>>,
    posts: Mutex<Vec<Post>>,
    comments: Mutex<Vec<Comment>>,
    // Counts `find_active_user` calls, i.e. Session Guard lookups.
    user_lookups: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    pub fn reset_lookups(&self) {
        self.user_lookups.store(0, Ordering::SeqCst);
    }

    /// Inserts an active user directly. The stored hash is not a real one, so seeded users
    /// cannot log in; use the register route for that.
    pub fn seed_user(&self, name: &str, email: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password: "not-a-real-hash".to_string(),
            status: Status::Active,
            role,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn seed_post(&self, owner: &User, title: &str) -> Post {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: format!("{title} content"),
            user_id: owner.id,
            status: Status::Active,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    pub fn seed_comment(&self, owner: &User, post: &Post, text: &str) -> Comment {
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            comment: text.to_string(),
            user_id: owner.id,
            post_id: post.id,
            status: Status::Active,
            created_at: now,
            updated_at: now,
        };
        self.comments.lock().unwrap().push(comment.clone());
        comment
    }

    // Raw reads, ignoring status.
    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    pub fn post(&self, id: Uuid) -> Option<Post> {
        self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    pub fn comment(&self, id: Uuid) -> Option<Comment> {
        self.comments.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.lock().unwrap().len()
    }

    pub fn mark_user_deleted(&self, id: Uuid) {
        if let Some(u) = self.users.lock().unwrap().iter_mut().find(|u| u.id == id) {
            u.status = Status::Deleted;
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_active_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id && u.status == Status::Active)
            .cloned())
    }

    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email && u.status == Status::Active)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::UniqueViolation("users_email_key".to_string()));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password: user.password_hash,
            status: Status::Active,
            role: Role::Normal,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<Option<User>, RepoError> {
        let mut users = self.users.lock().unwrap();
        Ok(users
            .iter_mut()
            .find(|u| u.id == id && u.status == Status::Active)
            .map(|u| {
                u.name = name.to_string();
                u.updated_at = Utc::now();
                u.clone()
            }))
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut users = self.users.lock().unwrap();
        match users
            .iter_mut()
            .find(|u| u.id == id && u.status == Status::Active)
        {
            Some(u) => {
                u.status = Status::Deleted;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_active_users(&self) -> Result<Vec<User>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.status == Status::Active)
            .cloned()
            .collect())
    }

    async fn find_active_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.status == Status::Active)
            .cloned())
    }

    async fn list_active_posts(&self) -> Result<Vec<Post>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|p| p.status == Status::Active)
            .cloned()
            .collect())
    }

    async fn create_post(&self, user_id: Uuid, req: CreatePostRequest) -> Result<Post, RepoError> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: req.title,
            content: req.content,
            user_id,
            status: Status::Active,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Result<Option<Post>, RepoError> {
        let mut posts = self.posts.lock().unwrap();
        Ok(posts
            .iter_mut()
            .find(|p| p.id == id && p.status == Status::Active)
            .map(|p| {
                if let Some(title) = req.title {
                    p.title = title;
                }
                if let Some(content) = req.content {
                    p.content = content;
                }
                p.updated_at = Utc::now();
                p.clone()
            }))
    }

    async fn soft_delete_post(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut posts = self.posts.lock().unwrap();
        match posts
            .iter_mut()
            .find(|p| p.id == id && p.status == Status::Active)
        {
            Some(p) => {
                p.status = Status::Deleted;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_active_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id && c.status == Status::Active)
            .cloned())
    }

    async fn list_active_comments(&self) -> Result<Vec<Comment>, RepoError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.status == Status::Active)
            .cloned()
            .collect())
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, RepoError> {
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            comment: req.comment,
            user_id,
            post_id: req.post_id,
            status: Status::Active,
            created_at: now,
            updated_at: now,
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, id: Uuid, text: &str) -> Result<Option<Comment>, RepoError> {
        let mut comments = self.comments.lock().unwrap();
        Ok(comments
            .iter_mut()
            .find(|c| c.id == id && c.status == Status::Active)
            .map(|c| {
                c.comment = text.to_string();
                c.updated_at = Utc::now();
                c.clone()
            }))
    }

    async fn soft_delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut comments = self.comments.lock().unwrap();
        match comments
            .iter_mut()
            .find(|c| c.id == id && c.status == Status::Active)
        {
            Some(c) => {
                c.status = Status::Deleted;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// --- TEST UTILITIES ---

pub fn test_state(repo: &Arc<InMemoryRepository>) -> AppState {
    AppState::new(repo.clone() as RepositoryState, AppConfig::default())
}

pub fn test_app(repo: &Arc<InMemoryRepository>) -> (AppState, Router) {
    let state = test_state(repo);
    let app = create_router(state.clone());
    (state, app)
}

/// `Authorization` header value for a fresh session of `user_id`.
pub fn bearer(state: &AppState, user_id: Uuid) -> String {
    let token = state.tokens.issue(user_id).expect("token should be issued");
    format!("Bearer {token}")
}

pub fn request(method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Runs one request through the router and decodes the JSON body (`Null` when empty).
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
