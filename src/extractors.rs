use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::session::get_cookie_value;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Resolve the caller from the session cookie.
///
/// No cookie, a bad or expired token, and a token for a user that no longer
/// exists all come back as `Ok(None)`. Only a storage failure is an error.
pub async fn current_user(headers: &HeaderMap, state: &AppState) -> AppResult<Option<User>> {
    let Some(token) = get_cookie_value(headers, state.sessions.cookie_name()) else {
        return Ok(None);
    };

    let Some(user_id) = state.sessions.verify_token(token) else {
        return Ok(None);
    };

    let user = state.repo.find_user(&user_id).await?;
    if user.is_none() {
        tracing::debug!("Session token names unknown user {}", user_id);
    }
    Ok(user)
}

/// The authenticated caller. Rejects with 401 when there is none.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_user(&parts.headers, state)
            .await?
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// `Json` whose rejections use the JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` with the JSON error body on rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `Path` with the JSON error body on rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
