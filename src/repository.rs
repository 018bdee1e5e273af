use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::RepoError,
    models::{
        Comment, CommentWithAuthor, CreateCommentRequest, CreatePostRequest, NewUser, Post,
        PostWithComments, PostWithDetails, UpdatePostRequest, User, UserWithPosts,
    },
};

/// Repository Trait
///
/// The abstract contract for all persistence operations (the Credential Store plus the
/// post/comment tables). Handlers and guards only ever see `Arc<dyn Repository>`, so the
/// Postgres implementation can be swapped for an in-memory one in tests.
///
/// Every lookup named `*_active_*` filters on `status = 'active'`: soft-deleted rows are
/// invisible to them. A comment only counts as active while its post is active too.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_active_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    // Fails with `RepoError::UniqueViolation` when the email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<Option<User>, RepoError>;
    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn list_active_users(&self) -> Result<Vec<User>, RepoError>;

    // --- Posts ---
    async fn find_active_post(&self, id: Uuid) -> Result<Option<Post>, RepoError>;
    async fn list_active_posts(&self) -> Result<Vec<Post>, RepoError>;
    async fn create_post(&self, user_id: Uuid, req: CreatePostRequest) -> Result<Post, RepoError>;
    // Partial update: `None` fields keep their stored value.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Result<Option<Post>, RepoError>;
    async fn soft_delete_post(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Comments ---
    async fn find_active_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError>;
    async fn list_active_comments(&self) -> Result<Vec<Comment>, RepoError>;
    async fn create_comment(
        &self,
        user_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, RepoError>;
    async fn update_comment(&self, id: Uuid, text: &str) -> Result<Option<Comment>, RepoError>;
    async fn soft_delete_comment(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Read models ---

    /// Active users, each with their active posts (with comments and comment authors) and
    /// their own active comments.
    async fn users_with_posts(&self) -> Result<Vec<UserWithPosts>, RepoError> {
        let users = self.list_active_users().await?;
        let posts = self.list_active_posts().await?;
        let comments = self.list_active_comments().await?;
        Ok(assemble_users(users, posts, comments))
    }

    /// Active posts with their author and their comments (with authors).
    async fn posts_with_details(&self) -> Result<Vec<PostWithDetails>, RepoError> {
        let users = self.list_active_users().await?;
        let posts = self.list_active_posts().await?;
        let comments = self.list_active_comments().await?;
        Ok(assemble_posts(users, posts, comments))
    }

    /// Active comments on active posts, with their author.
    async fn comments_with_authors(&self) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let users = self.list_active_users().await?;
        let posts = self.list_active_posts().await?;
        let comments = on_posts(self.list_active_comments().await?, &posts);
        let by_id = index_users(&users);
        Ok(attach_authors(comments, &by_id))
    }
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Read model assembly ---
//
// Records whose owner is not active are dropped: a comment by a deleted user does not show
// up under any post, and a post by a deleted user does not show up in the listing. Comments
// left on a deleted post are dropped with it.

fn on_posts(comments: Vec<Comment>, posts: &[Post]) -> Vec<Comment> {
    let live: HashSet<Uuid> = posts.iter().map(|p| p.id).collect();
    comments
        .into_iter()
        .filter(|c| live.contains(&c.post_id))
        .collect()
}

fn index_users(users: &[User]) -> HashMap<Uuid, &User> {
    users.iter().map(|u| (u.id, u)).collect()
}

fn attach_authors(comments: Vec<Comment>, users: &HashMap<Uuid, &User>) -> Vec<CommentWithAuthor> {
    comments
        .into_iter()
        .filter_map(|comment| {
            let user = (*users.get(&comment.user_id)?).clone();
            Some(CommentWithAuthor { comment, user })
        })
        .collect()
}

fn group_by_post(comments: Vec<CommentWithAuthor>) -> HashMap<Uuid, Vec<CommentWithAuthor>> {
    let mut grouped: HashMap<Uuid, Vec<CommentWithAuthor>> = HashMap::new();
    for c in comments {
        grouped.entry(c.comment.post_id).or_default().push(c);
    }
    grouped
}

pub fn assemble_posts(
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
) -> Vec<PostWithDetails> {
    let by_id = index_users(&users);
    let mut comments_by_post = group_by_post(attach_authors(comments, &by_id));

    posts
        .into_iter()
        .filter_map(|post| {
            let user = (*by_id.get(&post.user_id)?).clone();
            let comments = comments_by_post.remove(&post.id).unwrap_or_default();
            Some(PostWithDetails { post, user, comments })
        })
        .collect()
}

pub fn assemble_users(
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
) -> Vec<UserWithPosts> {
    let by_id = index_users(&users);
    let comments = on_posts(comments, &posts);

    let mut own_comments: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for c in &comments {
        own_comments.entry(c.user_id).or_default().push(c.clone());
    }

    let mut comments_by_post = group_by_post(attach_authors(comments, &by_id));
    let mut posts_by_user: HashMap<Uuid, Vec<PostWithComments>> = HashMap::new();
    for post in posts {
        let comments = comments_by_post.remove(&post.id).unwrap_or_default();
        posts_by_user
            .entry(post.user_id)
            .or_default()
            .push(PostWithComments { post, comments });
    }

    users
        .into_iter()
        .map(|user| UserWithPosts {
            posts: posts_by_user.remove(&user.id).unwrap_or_default(),
            comments: own_comments.remove(&user.id).unwrap_or_default(),
            user,
        })
        .collect()
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_active_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password, status, role, created_at, updated_at
               FROM users
               WHERE id = $1 AND status = 'active'"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password, status, role, created_at, updated_at
               FROM users
               WHERE email = $1 AND status = 'active'"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// New accounts always start as `active` / `normal`; the `users_email_key` unique index
    /// turns a concurrent double registration into `RepoError::UniqueViolation`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let created = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, name, email, password, status, role, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 'active', 'normal', NOW(), NOW())
               RETURNING id, name, email, password, status, role, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users SET name = $2, updated_at = NOW()
               WHERE id = $1 AND status = 'active'
               RETURNING id, name, email, password, status, role, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query(
            "UPDATE users SET status = 'deleted', updated_at = NOW() WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_active_users(&self) -> Result<Vec<User>, RepoError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password, status, role, created_at, updated_at
               FROM users
               WHERE status = 'active'
               ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_active_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let post = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, user_id, status, created_at, updated_at
               FROM posts
               WHERE id = $1 AND status = 'active'"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn list_active_posts(&self) -> Result<Vec<Post>, RepoError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, user_id, status, created_at, updated_at
               FROM posts
               WHERE status = 'active'
               ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn create_post(&self, user_id: Uuid, req: CreatePostRequest) -> Result<Post, RepoError> {
        let post = sqlx::query_as::<_, Post>(
            r#"INSERT INTO posts (id, title, content, user_id, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 'active', NOW(), NOW())
               RETURNING id, title, content, user_id, status, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    /// update_post
    ///
    /// `COALESCE` keeps the stored value for every field the request left out.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Result<Option<Post>, RepoError> {
        let post = sqlx::query_as::<_, Post>(
            r#"UPDATE posts
               SET title = COALESCE($2, title),
                   content = COALESCE($3, content),
                   updated_at = NOW()
               WHERE id = $1 AND status = 'active'
               RETURNING id, title, content, user_id, status, created_at, updated_at"#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn soft_delete_post(&self, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query(
            "UPDATE posts SET status = 'deleted', updated_at = NOW() WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_active_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"SELECT c.id, c.comment, c.user_id, c.post_id, c.status, c.created_at, c.updated_at
               FROM comments c
               JOIN posts p ON p.id = c.post_id
               WHERE c.id = $1 AND c.status = 'active' AND p.status = 'active'"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_active_comments(&self) -> Result<Vec<Comment>, RepoError> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"SELECT c.id, c.comment, c.user_id, c.post_id, c.status, c.created_at, c.updated_at
               FROM comments c
               JOIN posts p ON p.id = c.post_id
               WHERE c.status = 'active' AND p.status = 'active'
               ORDER BY c.created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        req: CreateCommentRequest,
    ) -> Result<Comment, RepoError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (id, comment, user_id, post_id, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 'active', NOW(), NOW())
               RETURNING id, comment, user_id, post_id, status, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(req.comment)
        .bind(user_id)
        .bind(req.post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(&self, id: Uuid, text: &str) -> Result<Option<Comment>, RepoError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"UPDATE comments SET comment = $2, updated_at = NOW()
               WHERE id = $1 AND status = 'active'
               RETURNING id, comment, user_id, post_id, status, created_at, updated_at"#,
        )
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn soft_delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query(
            "UPDATE comments SET status = 'deleted', updated_at = NOW() WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
