//! Projects and their members

use super::{ApiJson, nullable};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::guard::ProjectRelation::{self, Creator, Member};
use crate::guard::{require_permission, require_project_relation};
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use serde::Deserialize;
use tasktrack_db::{Database, Permission, Project, ProjectMember, ProjectUpdate, validate_id};
use tracing::info;

const VIEW_PROJECT: &[ProjectRelation] = &[Creator, Member];
const DELETE_PROJECT: &[ProjectRelation] = &[Creator];

#[derive(Debug, Deserialize)]
struct UpdateProject {
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct AddMember {
    user_id: String,
    role_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangeRole {
    role_id: Option<String>,
}

/// Resolve an optional role id to one owned by `project_id`.
async fn project_role(
    db: &Database,
    project_id: &str,
    role_id: Option<&str>,
) -> Result<Option<String>, ApiError> {
    match role_id {
        Some(role_id) => {
            validate_id(role_id)?;
            let role = db.roles().require_in_project(project_id, role_id).await?;
            Ok(Some(role.id))
        }
        None => Ok(None),
    }
}

async fn get_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Project>, ApiError> {
    let access = require_project_relation(&state.db, caller.id(), &id, VIEW_PROJECT).await?;
    Ok(ApiJson(access.project))
}

async fn update_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateProject>,
) -> Result<ApiJson<Project>, ApiError> {
    require_permission(&state.db, caller.id(), &id, Permission::ProjectUpdate).await?;

    let mut update = ProjectUpdate::new();
    if let Some(name) = request.name {
        update = update.with_name(name);
    }
    if let Some(description) = request.description {
        update = update.with_description(description);
    }
    let project = state.db.projects().update(&id, &update).await?;
    Ok(ApiJson(project))
}

async fn delete_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_project_relation(&state.db, caller.id(), &id, DELETE_PROJECT).await?;
    state.db.projects().delete(&id).await?;
    info!(project_id = %id, "deleted project");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Vec<ProjectMember>>, ApiError> {
    require_project_relation(&state.db, caller.id(), &id, VIEW_PROJECT).await?;
    let members = state.db.memberships().list_project_members(&id).await?;
    Ok(ApiJson(members))
}

/// Add a workspace member to the project.
async fn add_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddMember>,
) -> Result<(StatusCode, ApiJson<ProjectMember>), ApiError> {
    let access = require_permission(&state.db, caller.id(), &id, Permission::MemberManage).await?;
    validate_id(&request.user_id)?;

    let memberships = state.db.memberships();
    let in_workspace = memberships
        .workspace_role(&request.user_id, &access.project.workspace_id)
        .await?
        .is_some();
    if !in_workspace {
        return Err(ApiError::invalid(format!(
            "user '{}' is not a member of the project's workspace",
            request.user_id
        )));
    }

    let role_id = project_role(&state.db, &id, request.role_id.as_deref()).await?;
    let member = memberships
        .add_project_member(&request.user_id, &id, role_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, ApiJson(member)))
}

async fn change_member_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<ChangeRole>,
) -> Result<ApiJson<ProjectMember>, ApiError> {
    require_permission(&state.db, caller.id(), &id, Permission::MemberManage).await?;
    validate_id(&user_id)?;

    let memberships = state.db.memberships();
    if memberships.project_membership(&user_id, &id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "user '{}' is not a member of this project",
            user_id
        )));
    }
    let role_id = project_role(&state.db, &id, request.role_id.as_deref()).await?;
    let member = memberships
        .set_project_role(&user_id, &id, role_id.as_deref())
        .await?;
    Ok(ApiJson(member))
}

async fn remove_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let access = require_permission(&state.db, caller.id(), &id, Permission::MemberManage).await?;
    validate_id(&user_id)?;
    if access.project.creator_id == user_id {
        return Err(ApiError::conflict("the project creator cannot be removed"));
    }

    let memberships = state.db.memberships();
    if memberships.project_membership(&user_id, &id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "user '{}' is not a member of this project",
            user_id
        )));
    }
    memberships.remove_project_member(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/{id}/members", get(list_members).post(add_member))
        .route(
            "/projects/{id}/members/{user_id}",
            patch(change_member_role).delete(remove_member),
        )
}
