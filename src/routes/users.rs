use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::ProfileView;
use crate::error::{AppError, AppResult};
use crate::extractors::ApiPath;
use crate::state::AppState;

/// GET /api/users/{username}: public profile with the user's posts
async fn profile(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
) -> AppResult<Json<ProfileView>> {
    let user = state
        .repo
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let posts = state.repo.list_posts_by_author(&user.id).await?;
    Ok(Json(ProfileView::new(user, posts)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/users/{username}", get(profile))
}
