//! Registration and login

use super::ApiJson;
use crate::auth::{hash_password_async, verify_password_async};
use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use tasktrack_db::User;
use tasktrack_db::repository::validation;
use tracing::{info, warn};

const BAD_CREDENTIALS: &str = "invalid email or password";

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct Session {
    user: User,
    token: String,
}

/// Create an account and its personal workspace.
async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, ApiJson<Session>), ApiError> {
    validation::password(&request.password)?;
    let hash = hash_password_async(request.password).await?;

    let user = state
        .db
        .users()
        .create(&request.email, &request.name, &hash)
        .await?;
    if let Err(err) = state.db.workspaces().create_personal(&user.id).await {
        warn!(user_id = %user.id, error = %err, "personal workspace creation failed, rolling back user");
        state.db.users().delete(&user.id).await?;
        return Err(err.into());
    }

    info!(user_id = %user.id, "registered user");
    let token = state.tokens.issue(&user.id)?;
    Ok((StatusCode::CREATED, ApiJson(Session { user, token })))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiJson<Session>, ApiError> {
    let user = state
        .db
        .users()
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    if !verify_password_async(request.password, user.password_hash.clone()).await? {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let token = state.tokens.issue(&user.id)?;
    Ok(ApiJson(Session { user, token }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}
