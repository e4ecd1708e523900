// Domain types and input validation for the social graph. No I/O here.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::models::NewPost;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;
pub const MIN_PASSWORD_LEN: usize = 8;
/// bcrypt only reads this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_POST_LEN: usize = 2000;
pub const MAX_COMMENT_LEN: usize = 500;
pub const MAX_IMAGE_REF_LEN: usize = 2048;

/// How many posts a feed returns.
pub const FEED_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl From<ValidationError> for crate::error::AppError {
    fn from(err: ValidationError) -> Self {
        crate::error::AppError::BadRequest(err.0)
    }
}

fn invalid(msg: impl Into<String>) -> ValidationError {
    ValidationError(msg.into())
}

/// Something a user can like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Post(String),
    Comment { post_id: String, comment_id: String },
}

impl LikeTarget {
    pub(crate) fn like_table(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "likes",
            LikeTarget::Comment { .. } => "comment_likes",
        }
    }

    pub(crate) fn target_column(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "post_id",
            LikeTarget::Comment { .. } => "comment_id",
        }
    }

    pub fn target_id(&self) -> &str {
        match self {
            LikeTarget::Post(id) => id,
            LikeTarget::Comment { comment_id, .. } => comment_id,
        }
    }

    pub(crate) fn not_found_message(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "Post not found",
            LikeTarget::Comment { .. } => "Comment not found",
        }
    }
}

/// Like state of one target as seen by one user, after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostOrdering {
    /// Newest first
    #[default]
    Latest,
    /// Most liked first, newest first among equals
    Trending,
}

impl FromStr for PostOrdering {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "latest" => Ok(PostOrdering::Latest),
            "trending" => Ok(PostOrdering::Trending),
            other => Err(invalid(format!("Unknown sort order: {}", other))),
        }
    }
}

impl fmt::Display for PostOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostOrdering::Latest => write!(f, "latest"),
            PostOrdering::Trending => write!(f, "trending"),
        }
    }
}

// --- Validation ---

/// Trim and lowercase an email address, rejecting obviously broken ones.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(invalid("Email is required"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(invalid("Email is too long"));
    }
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("Email address is invalid"))?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || email.contains(' ') {
        return Err(invalid("Email address is invalid"));
    }
    Ok(email)
}

pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(invalid("Username is required"));
    }
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(invalid(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid(
            "Username may only contain letters, digits and underscores",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(invalid(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// Display names are optional; blank counts as absent.
pub fn validate_name(name: Option<&str>) -> Result<Option<String>, ValidationError> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    if let Some(n) = name {
        if n.chars().count() > MAX_NAME_LEN {
            return Err(invalid(format!(
                "Name must be {} characters or less",
                MAX_NAME_LEN
            )));
        }
    }
    Ok(name.map(str::to_string))
}

pub fn validate_post(content: Option<&str>, image: Option<&str>) -> Result<NewPost, ValidationError> {
    let content = content.map(str::trim).unwrap_or("");
    let image = image.map(str::trim).filter(|i| !i.is_empty());

    if content.is_empty() && image.is_none() {
        return Err(invalid("Post must contain either content or an image"));
    }
    if content.chars().count() > MAX_POST_LEN {
        return Err(invalid(format!(
            "Post must be {} characters or less",
            MAX_POST_LEN
        )));
    }
    if image.is_some_and(|i| i.len() > MAX_IMAGE_REF_LEN) {
        return Err(invalid("Image reference is too long"));
    }

    Ok(NewPost {
        content: content.to_string(),
        image: image.map(str::to_string),
    })
}

pub fn validate_comment(content: &str) -> Result<String, ValidationError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(invalid("Comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(invalid(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_LEN
        )));
    }
    Ok(content.to_string())
}
