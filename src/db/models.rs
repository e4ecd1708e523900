//! Typed records for each table and the JSON views assembled from them.
//!
//! Rows are mapped by hand in the `from_row` functions; queries alias the
//! joined user columns as `u_id`, `u_name`, `u_username` and `u_image`.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, email, username, name, password_hash, bio, image, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            username: row.get("username")?,
            name: row.get("name")?,
            password_hash: row.get("password_hash")?,
            bio: row.get("bio")?,
            image: row.get("image")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
        }
    }
}

/// The account as returned by register, login and `me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
}

/// Author/commenter details embedded in posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub username: String,
    pub image: Option<String>,
}

impl UserSummary {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("u_id")?,
            name: row.get("u_name")?,
            username: row.get("u_username")?,
            image: row.get("u_image")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            author_id: row.get("author_id")?,
            content: row.get("content")?,
            image: row.get("image")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            parent_id: row.get("parent_id")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            post_id: row.get("post_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLike {
    pub id: String,
    pub user_id: String,
    pub comment_id: String,
    pub created_at: DateTime<Utc>,
}

impl CommentLike {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            comment_id: row.get("comment_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

// --- Views ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: UserSummary,
    pub likes: Vec<Like>,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: UserSummary,
    pub likes: Vec<CommentLikeView>,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentLikeView {
    #[serde(flatten)]
    pub like: CommentLike,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: UserSummary,
}

/// Public profile page data. The email address is not part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub posts: Vec<PostView>,
}

impl ProfileView {
    pub fn new(user: User, posts: Vec<PostView>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            bio: user.bio,
            image: user.image,
            created_at: user.created_at,
            posts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            name: Some("Ada".into()),
            password_hash: "$2b$04$secret".into(),
            bio: None,
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn user_json_never_contains_password_hash() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");
    }

    #[test]
    fn account_view_has_exactly_identity_fields() {
        let json = serde_json::to_value(sample_user().public()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "u1",
                "email": "ada@example.com",
                "username": "ada",
                "name": "Ada",
            })
        );
    }

    #[test]
    fn profile_hides_email() {
        let json = serde_json::to_value(ProfileView::new(sample_user(), vec![])).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["posts"], serde_json::json!([]));
    }

    #[test]
    fn post_view_flattens_into_camel_case() {
        let now = Utc::now();
        let view = PostView {
            post: Post {
                id: "p1".into(),
                author_id: "u1".into(),
                content: "hello".into(),
                image: None,
                created_at: now,
                updated_at: now,
            },
            author: UserSummary {
                id: "u1".into(),
                name: None,
                username: "ada".into(),
                image: None,
            },
            likes: vec![],
            comments: vec![],
        };
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["authorId"], "u1");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["author"]["username"], "ada");
        assert!(json.get("post").is_none());
    }
}
