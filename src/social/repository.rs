// Repository pattern - every read and write against the social tables
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{
    Comment, CommentLike, CommentLikeView, CommentView, Like, NewPost, NewUser, Post, PostView,
    ReplyView, User, UserSummary,
};
use crate::social::domain::{LikeStatus, LikeTarget, PostOrdering, FEED_LIMIT};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Resource access layer. Each method is one atomic read or write.
#[async_trait]
pub trait SocialRepository: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<User>, RepositoryError>;

    /// Insert a user. Duplicate email or username is a `Conflict` and writes nothing.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn create_post(&self, author_id: &str, post: NewPost)
        -> Result<PostView, RepositoryError>;

    async fn list_posts(&self, ordering: PostOrdering) -> Result<Vec<PostView>, RepositoryError>;

    async fn list_posts_by_author(&self, author_id: &str)
        -> Result<Vec<PostView>, RepositoryError>;

    /// Flip the caller's like on `target` in a single write transaction.
    async fn toggle_like(
        &self,
        user_id: &str,
        target: &LikeTarget,
    ) -> Result<LikeStatus, RepositoryError>;

    /// Idempotently set the caller's like on `target`.
    async fn set_like(
        &self,
        user_id: &str,
        target: &LikeTarget,
        liked: bool,
    ) -> Result<LikeStatus, RepositoryError>;

    async fn create_comment(
        &self,
        user_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<CommentView, RepositoryError>;

    async fn create_reply(
        &self,
        user_id: &str,
        post_id: &str,
        parent_id: &str,
        content: &str,
    ) -> Result<ReplyView, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteSocialRepository {
    pool: DbPool,
}

impl SqliteSocialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynSocialRepository = Arc<dyn SocialRepository>;

const POST_SELECT: &str = "SELECT p.id, p.author_id, p.content, p.image, p.created_at, p.updated_at,
            u.id AS u_id, u.name AS u_name, u.username AS u_username, u.image AS u_image
     FROM posts p
     JOIN users u ON u.id = p.author_id";

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.user_id, c.parent_id, c.content, c.created_at, c.updated_at,
            u.id AS u_id, u.name AS u_name, u.username AS u_username, u.image AS u_image
     FROM comments c
     JOIN users u ON u.id = c.user_id";

#[async_trait]
impl SocialRepository for SqliteSocialRepository {
    async fn find_user(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        find_user_where(&conn, "id", id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        find_user_where(&conn, "email", email)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        find_user_where(&conn, "username", username)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;

        let id = uuid::Uuid::now_v7().to_string();
        let now = Utc::now();

        let inserted = conn.execute(
            "INSERT INTO users (id, email, username, name, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, user.email, user.username, user.name, user.password_hash, now],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                return Err(RepositoryError::Conflict("User already exists".into()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Created user {} ({})", user.username, id);

        Ok(User {
            id,
            email: user.email,
            username: user.username,
            name: user.name,
            password_hash: user.password_hash,
            bio: None,
            image: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn create_post(
        &self,
        author_id: &str,
        post: NewPost,
    ) -> Result<PostView, RepositoryError> {
        let conn = self.pool.get()?;

        let author = load_user_summary(&conn, author_id)?
            .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        let id = uuid::Uuid::now_v7().to_string();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO posts (id, author_id, content, image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, author_id, post.content, post.image, now],
        )?;

        Ok(PostView {
            post: Post {
                id,
                author_id: author_id.to_string(),
                content: post.content,
                image: post.image,
                created_at: now,
                updated_at: now,
            },
            author,
            likes: Vec::new(),
            comments: Vec::new(),
        })
    }

    async fn list_posts(&self, ordering: PostOrdering) -> Result<Vec<PostView>, RepositoryError> {
        let conn = self.pool.get()?;

        let order_by = match ordering {
            PostOrdering::Latest => "p.created_at DESC, p.id DESC",
            PostOrdering::Trending => {
                "(SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) DESC, p.created_at DESC, p.id DESC"
            }
        };
        let sql = format!("{} ORDER BY {} LIMIT ?1", POST_SELECT, order_by);
        let posts = query_posts(&conn, &sql, params![FEED_LIMIT])?;

        assemble_post_views(&conn, posts)
    }

    async fn list_posts_by_author(
        &self,
        author_id: &str,
    ) -> Result<Vec<PostView>, RepositoryError> {
        let conn = self.pool.get()?;

        let sql = format!(
            "{} WHERE p.author_id = ?1 ORDER BY p.created_at DESC, p.id DESC LIMIT ?2",
            POST_SELECT
        );
        let posts = query_posts(&conn, &sql, params![author_id, FEED_LIMIT])?;

        assemble_post_views(&conn, posts)
    }

    async fn toggle_like(
        &self,
        user_id: &str,
        target: &LikeTarget,
    ) -> Result<LikeStatus, RepositoryError> {
        let mut conn = self.pool.get()?;

        // IMMEDIATE takes the write lock up front, so concurrent toggles run
        // one after another instead of interleaving their read and write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_target_exists(&tx, target)?;

        let removed = tx.execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                target.like_table(),
                target.target_column()
            ),
            params![user_id, target.target_id()],
        )?;
        if removed == 0 {
            insert_like(&tx, user_id, target)?;
        }

        let status = like_status(&tx, user_id, target)?;
        tx.commit()?;

        Ok(status)
    }

    async fn set_like(
        &self,
        user_id: &str,
        target: &LikeTarget,
        liked: bool,
    ) -> Result<LikeStatus, RepositoryError> {
        let conn = self.pool.get()?;

        ensure_target_exists(&conn, target)?;

        if liked {
            insert_like(&conn, user_id, target)?;
        } else {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                    target.like_table(),
                    target.target_column()
                ),
                params![user_id, target.target_id()],
            )?;
        }

        like_status(&conn, user_id, target)
    }

    async fn create_comment(
        &self,
        user_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<CommentView, RepositoryError> {
        let conn = self.pool.get()?;

        ensure_target_exists(&conn, &LikeTarget::Post(post_id.to_string()))?;
        let user = load_user_summary(&conn, user_id)?
            .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;

        let comment = insert_comment(&conn, user_id, post_id, None, content)?;

        Ok(CommentView {
            comment,
            user,
            likes: Vec::new(),
            replies: Vec::new(),
        })
    }

    async fn create_reply(
        &self,
        user_id: &str,
        post_id: &str,
        parent_id: &str,
        content: &str,
    ) -> Result<ReplyView, RepositoryError> {
        let conn = self.pool.get()?;

        let parent: Option<Option<String>> = conn
            .query_row(
                "SELECT parent_id FROM comments WHERE id = ?1 AND post_id = ?2",
                params![parent_id, post_id],
                |row| row.get(0),
            )
            .optional()?;
        let parent = parent.ok_or_else(|| RepositoryError::NotFound("Comment not found".into()))?;

        // Threads are one level deep: a reply to a reply hangs off the same
        // top-level comment.
        let thread_root = parent.unwrap_or_else(|| parent_id.to_string());

        let user = load_user_summary(&conn, user_id)?
            .ok_or_else(|| RepositoryError::NotFound("User not found".into()))?;
        let comment = insert_comment(&conn, user_id, post_id, Some(&thread_root), content)?;

        Ok(ReplyView { comment, user })
    }
}

// --- Query helpers ---

fn is_constraint(err: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code
    )
}

fn find_user_where(
    conn: &Connection,
    column: &'static str,
    value: &str,
) -> Result<Option<User>, RepositoryError> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", User::COLUMNS, column);
    Ok(conn
        .query_row(&sql, params![value], User::from_row)
        .optional()?)
}

fn load_user_summary(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<UserSummary>, RepositoryError> {
    Ok(conn
        .query_row(
            "SELECT id AS u_id, name AS u_name, username AS u_username, image AS u_image
             FROM users WHERE id = ?1",
            params![user_id],
            UserSummary::from_row,
        )
        .optional()?)
}

fn ensure_target_exists(conn: &Connection, target: &LikeTarget) -> Result<(), RepositoryError> {
    let exists: bool = match target {
        LikeTarget::Post(id) => conn.query_row(
            "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?,
        LikeTarget::Comment {
            post_id,
            comment_id,
        } => conn.query_row(
            "SELECT COUNT(*) > 0 FROM comments WHERE id = ?1 AND post_id = ?2",
            params![comment_id, post_id],
            |row| row.get(0),
        )?,
    };

    if exists {
        Ok(())
    } else {
        Err(RepositoryError::NotFound(target.not_found_message().into()))
    }
}

/// Insert a like unless one already exists; the UNIQUE (user, target)
/// constraint makes this a no-op for duplicates.
fn insert_like(conn: &Connection, user_id: &str, target: &LikeTarget) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO {table} (id, user_id, {column}, created_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, {column}) DO NOTHING",
        table = target.like_table(),
        column = target.target_column()
    );
    conn.execute(
        &sql,
        params![
            uuid::Uuid::now_v7().to_string(),
            user_id,
            target.target_id(),
            Utc::now()
        ],
    )?;
    Ok(())
}

fn like_status(
    conn: &Connection,
    user_id: &str,
    target: &LikeTarget,
) -> Result<LikeStatus, RepositoryError> {
    let sql = format!(
        "SELECT COUNT(*), COALESCE(SUM(user_id = ?1), 0) > 0 FROM {} WHERE {} = ?2",
        target.like_table(),
        target.target_column()
    );
    let (like_count, liked) = conn.query_row(&sql, params![user_id, target.target_id()], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?))
    })?;
    Ok(LikeStatus { liked, like_count })
}

fn insert_comment(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
    parent_id: Option<&str>,
    content: &str,
) -> Result<Comment, RepositoryError> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, parent_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![id, post_id, user_id, parent_id, content, now],
    )?;

    Ok(Comment {
        id,
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        content: content.to_string(),
        created_at: now,
        updated_at: now,
    })
}

fn query_posts(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<(Post, UserSummary)>, RepositoryError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((Post::from_row(row)?, UserSummary::from_row(row)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn assemble_post_views(
    conn: &Connection,
    posts: Vec<(Post, UserSummary)>,
) -> Result<Vec<PostView>, RepositoryError> {
    posts
        .into_iter()
        .map(|(post, author)| {
            let likes = load_likes(conn, &post.id)?;
            let comments = load_comments(conn, &post.id)?;
            Ok(PostView {
                post,
                author,
                likes,
                comments,
            })
        })
        .collect()
}

fn load_likes(conn: &Connection, post_id: &str) -> Result<Vec<Like>, RepositoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, post_id, created_at FROM likes
         WHERE post_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let likes = stmt
        .query_map(params![post_id], Like::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(likes)
}

fn load_comments(conn: &Connection, post_id: &str) -> Result<Vec<CommentView>, RepositoryError> {
    let sql = format!(
        "{} WHERE c.post_id = ?1 AND c.parent_id IS NULL ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let top_level = stmt
        .query_map(params![post_id], |row| {
            Ok((Comment::from_row(row)?, UserSummary::from_row(row)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    top_level
        .into_iter()
        .map(|(comment, user)| {
            let likes = load_comment_likes(conn, &comment.id)?;
            let replies = load_replies(conn, &comment.id)?;
            Ok(CommentView {
                comment,
                user,
                likes,
                replies,
            })
        })
        .collect()
}

fn load_replies(conn: &Connection, parent_id: &str) -> Result<Vec<ReplyView>, RepositoryError> {
    let sql = format!(
        "{} WHERE c.parent_id = ?1 ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let replies = stmt
        .query_map(params![parent_id], |row| {
            Ok(ReplyView {
                comment: Comment::from_row(row)?,
                user: UserSummary::from_row(row)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(replies)
}

fn load_comment_likes(
    conn: &Connection,
    comment_id: &str,
) -> Result<Vec<CommentLikeView>, RepositoryError> {
    let mut stmt = conn.prepare(
        "SELECT cl.id, cl.user_id, cl.comment_id, cl.created_at,
                u.id AS u_id, u.name AS u_name, u.username AS u_username, u.image AS u_image
         FROM comment_likes cl
         JOIN users u ON u.id = cl.user_id
         WHERE cl.comment_id = ?1
         ORDER BY cl.created_at ASC, cl.id ASC",
    )?;
    let likes = stmt
        .query_map(params![comment_id], |row| {
            Ok(CommentLikeView {
                like: CommentLike::from_row(row)?,
                user: UserSummary::from_row(row)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(likes)
}
