use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{CommentView, PostView, ReplyView};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::social::{domain, LikeStatus, LikeTarget, PostOrdering};
use crate::state::AppState;

// --- Requests ---

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub liked: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub status: LikeStatus,
}

impl From<LikeStatus> for LikeResponse {
    fn from(status: LikeStatus) -> Self {
        Self {
            success: true,
            status,
        }
    }
}

/// What a like request asks for. `None` means flip the current state.
///
/// An empty body (or `{}`) toggles; `{"liked": true|false}` sets the state
/// outright, so a retried request cannot undo itself.
fn like_intent(body: &[u8]) -> AppResult<Option<bool>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let req: LikeRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid like request: {}", e)))?;
    Ok(req.liked)
}

async fn apply_like(
    state: &AppState,
    user_id: &str,
    target: LikeTarget,
    body: &[u8],
) -> AppResult<Json<LikeResponse>> {
    let status = match like_intent(body)? {
        None => state.repo.toggle_like(user_id, &target).await?,
        Some(liked) => state.repo.set_like(user_id, &target, liked).await?,
    };
    tracing::debug!(
        "Like on {} by {} is now {}",
        target.target_id(),
        user_id,
        status.liked
    );
    Ok(Json(status.into()))
}

// --- Handlers ---

/// GET /api/posts?sort=latest|trending
async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let ordering: PostOrdering = query.sort.as_deref().unwrap_or_default().parse()?;
    Ok(Json(state.repo.list_posts(ordering).await?))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> AppResult<Json<PostView>> {
    let new_post = domain::validate_post(req.content.as_deref(), req.image.as_deref())?;
    let post = state.repo.create_post(&user.id, new_post).await?;
    tracing::info!("{} created post {}", user.username, post.post.id);
    Ok(Json(post))
}

/// POST /api/posts/{post_id}/like
async fn like_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<String>,
    body: Bytes,
) -> AppResult<Json<LikeResponse>> {
    apply_like(&state, &user.id, LikeTarget::Post(post_id), &body).await
}

/// POST /api/posts/{post_id}/comments
async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<String>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> AppResult<Json<CommentView>> {
    let content = domain::validate_comment(&req.content)?;
    let comment = state
        .repo
        .create_comment(&user.id, &post_id, &content)
        .await?;
    Ok(Json(comment))
}

/// POST /api/posts/{post_id}/comments/{comment_id}/replies
async fn create_reply(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((post_id, comment_id)): ApiPath<(String, String)>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> AppResult<Json<ReplyView>> {
    let content = domain::validate_comment(&req.content)?;
    let reply = state
        .repo
        .create_reply(&user.id, &post_id, &comment_id, &content)
        .await?;
    Ok(Json(reply))
}

/// POST /api/posts/{post_id}/comments/{comment_id}/like
async fn like_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((post_id, comment_id)): ApiPath<(String, String)>,
    body: Bytes,
) -> AppResult<Json<LikeResponse>> {
    let target = LikeTarget::Comment {
        post_id,
        comment_id,
    };
    apply_like(&state, &user.id, target, &body).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{post_id}/like", post(like_post))
        .route("/api/posts/{post_id}/comments", post(create_comment))
        .route(
            "/api/posts/{post_id}/comments/{comment_id}/replies",
            post(create_reply),
        )
        .route(
            "/api/posts/{post_id}/comments/{comment_id}/like",
            post(like_comment),
        )
}
