use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::password;
use crate::db::models::{NewUser, PublicUser, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::social::domain;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

// -- Helpers --

/// Sign a token for `user` and attach it as the session cookie.
fn signed_in(state: &AppState, status: StatusCode, user: &User) -> AppResult<Response> {
    let token = state
        .sessions
        .issue_token(&user.id)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        status,
        [(header::SET_COOKIE, state.sessions.session_cookie(&token))],
        Json(UserResponse {
            user: user.public(),
        }),
    )
        .into_response())
}

// -- Handlers --

/// POST /register: create an account and sign it in
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let email = domain::normalize_email(&req.email)?;
    let username = domain::validate_username(&req.username)?;
    let name = domain::validate_name(req.name.as_deref())?;
    domain::validate_password(&req.password)?;

    let password_hash =
        password::hash_password_blocking(req.password, state.config.auth.bcrypt_cost).await?;

    // The UNIQUE constraints decide duplicates; there is no separate
    // existence check to race against.
    let user = state
        .repo
        .create_user(NewUser {
            email,
            username,
            name,
            password_hash,
        })
        .await?;

    signed_in(&state, StatusCode::CREATED, &user)
}

/// POST /api/auth/login: check credentials and issue a session cookie
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();

    let Some(user) = state.repo.find_user_by_email(&email).await? else {
        tracing::debug!("Login for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let matches =
        password::verify_password_blocking(req.password, user.password_hash.clone()).await?;
    if !matches {
        tracing::debug!("Login with wrong password for {}", user.username);
        return Err(AppError::InvalidCredentials);
    }

    signed_in(&state, StatusCode::OK, &user)
}

/// POST /api/auth/logout: drop the client's cookie
///
/// Tokens are not tracked server-side, so a copied token stays valid until
/// it expires.
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, state.sessions.clear_session_cookie())],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response()
}

/// GET /api/auth/me: who am I
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: user.public(),
    })
}
