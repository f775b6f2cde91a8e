//! Permission catalog and project roles

use super::ApiJson;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::guard::ProjectRelation::{self, Creator, Member};
use crate::guard::{require_permission, require_project_relation};
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use serde::{Deserialize, Serialize};
use tasktrack_db::{Permission, ProjectRole, RoleUpdate, validate_id};

const VIEW_ROLES: &[ProjectRelation] = &[Creator, Member];

#[derive(Debug, Serialize)]
struct PermissionInfo {
    name: &'static str,
    description: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreateRole {
    name: String,
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
struct UpdateRole {
    name: Option<String>,
    permissions: Option<Vec<Permission>>,
}

fn catalog() -> Vec<PermissionInfo> {
    Permission::ALL
        .iter()
        .map(|permission| PermissionInfo {
            name: permission.as_str(),
            description: permission.description(),
        })
        .collect()
}

async fn list_permissions() -> ApiJson<Vec<PermissionInfo>> {
    ApiJson(catalog())
}

async fn list_roles(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Vec<ProjectRole>>, ApiError> {
    require_project_relation(&state.db, caller.id(), &id, VIEW_ROLES).await?;
    let roles = state.db.roles().list_for_project(&id).await?;
    Ok(ApiJson(roles))
}

async fn create_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CreateRole>,
) -> Result<(StatusCode, ApiJson<ProjectRole>), ApiError> {
    require_permission(&state.db, caller.id(), &id, Permission::RoleManage).await?;
    let role = state
        .db
        .roles()
        .create(&id, &request.name, &request.permissions)
        .await?;
    Ok((StatusCode::CREATED, ApiJson(role)))
}

async fn update_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, role_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<UpdateRole>,
) -> Result<ApiJson<ProjectRole>, ApiError> {
    require_permission(&state.db, caller.id(), &id, Permission::RoleManage).await?;
    validate_id(&role_id)?;
    let roles = state.db.roles();
    roles.require_in_project(&id, &role_id).await?;

    let mut update = RoleUpdate::new();
    if let Some(name) = request.name {
        update = update.with_name(name);
    }
    if let Some(permissions) = request.permissions {
        update = update.with_permissions(permissions);
    }
    let role = roles.update(&role_id, &update).await?;
    Ok(ApiJson(role))
}

/// Delete a role. Members holding it are left without a role.
async fn delete_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, role_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_permission(&state.db, caller.id(), &id, Permission::RoleManage).await?;
    validate_id(&role_id)?;
    let roles = state.db.roles();
    roles.require_in_project(&id, &role_id).await?;
    roles.delete(&role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/permissions", get(list_permissions))
        .route("/projects/{id}/roles", get(list_roles).post(create_role))
        .route(
            "/projects/{id}/roles/{role_id}",
            patch(update_role).delete(delete_role),
        )
}
