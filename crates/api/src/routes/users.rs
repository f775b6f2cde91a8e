//! The caller's account and user lookups

use super::ApiJson;
use crate::auth::{AuthUser, hash_password_async};
use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Deserialize;
use tasktrack_db::repository::validation;
use tasktrack_db::{User, UserUpdate, validate_id};
use tracing::info;

#[derive(Debug, Deserialize)]
struct UpdateMe {
    name: Option<String>,
    password: Option<String>,
}

async fn me(AuthUser(user): AuthUser) -> ApiJson<User> {
    ApiJson(user)
}

async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<UpdateMe>,
) -> Result<ApiJson<User>, ApiError> {
    let mut update = UserUpdate::new();
    if let Some(name) = request.name {
        update = update.with_name(name);
    }
    if let Some(password) = request.password {
        validation::password(&password)?;
        update = update.with_password_hash(hash_password_async(password).await?);
    }

    let user = state.db.users().update(&user.id, &update).await?;
    Ok(ApiJson(user))
}

/// Delete the caller's account.
///
/// Refused while the caller still owns group workspaces; those must be
/// deleted first. The personal workspace goes with the account.
async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    let owned = state.db.workspaces().owned_groups(&user.id).await?;
    if !owned.is_empty() {
        return Err(ApiError::conflict(format!(
            "delete or hand over your {} group workspace(s) first",
            owned.len()
        )));
    }

    if let Some(personal) = state.db.workspaces().personal_for(&user.id).await? {
        state.db.workspaces().delete(&personal.id).await?;
    }
    state.db.users().delete(&user.id).await?;

    info!(user_id = %user.id, "deleted account");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<User>, ApiError> {
    validate_id(&id)?;
    let user = state.db.users().require(&id).await?;
    Ok(ApiJson(user))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).patch(update_me).delete(delete_me))
        .route("/users/{id}", get(get_user))
}
