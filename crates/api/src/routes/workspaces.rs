//! Workspaces, their members and their projects

use super::{ApiJson, nullable};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::guard::{DenyReason, require_workspace_role};
use crate::state::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use serde::Deserialize;
use tasktrack_db::MemberRole::{self, Admin, Member, Owner};
use tasktrack_db::{Project, Workspace, WorkspaceKind, WorkspaceMember, WorkspaceUpdate, validate_id};
use tracing::info;

const VIEW_WORKSPACE: &[MemberRole] = &[Owner, Admin, Member];
const EDIT_WORKSPACE: &[MemberRole] = &[Owner, Admin];
const DELETE_WORKSPACE: &[MemberRole] = &[Owner];
const INVITE_MEMBER: &[MemberRole] = &[Owner, Admin];
const CHANGE_MEMBER_ROLE: &[MemberRole] = &[Owner];
const REMOVE_MEMBER: &[MemberRole] = &[Owner, Admin];
const CREATE_PROJECT: &[MemberRole] = &[Owner, Admin, Member];

#[derive(Debug, Deserialize)]
struct CreateWorkspace {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateWorkspace {
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct AddMember {
    email: String,
    role: MemberRole,
}

#[derive(Debug, Deserialize)]
struct ChangeRole {
    role: MemberRole,
}

#[derive(Debug, Deserialize)]
struct CreateProject {
    name: String,
    description: Option<String>,
}

/// Roles that can be handed out through the members endpoints
fn assignable(role: MemberRole) -> Result<MemberRole, ApiError> {
    if role == Owner {
        return Err(ApiError::invalid("the owner role cannot be assigned"));
    }
    Ok(role)
}

async fn create_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<CreateWorkspace>,
) -> Result<(StatusCode, ApiJson<Workspace>), ApiError> {
    let workspace = state
        .db
        .workspaces()
        .create(
            &request.name,
            request.description.as_deref(),
            WorkspaceKind::Group,
            caller.id(),
        )
        .await?;
    info!(workspace_id = %workspace.id, owner = caller.id(), "created workspace");
    Ok((StatusCode::CREATED, ApiJson(workspace)))
}

async fn list_workspaces(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiJson<Vec<Workspace>>, ApiError> {
    let workspaces = state.db.workspaces().list_for_user(caller.id()).await?;
    Ok(ApiJson(workspaces))
}

async fn get_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Workspace>, ApiError> {
    let access = require_workspace_role(&state.db, caller.id(), &id, VIEW_WORKSPACE).await?;
    Ok(ApiJson(access.workspace))
}

async fn update_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateWorkspace>,
) -> Result<ApiJson<Workspace>, ApiError> {
    require_workspace_role(&state.db, caller.id(), &id, EDIT_WORKSPACE).await?;

    let mut update = WorkspaceUpdate::new();
    if let Some(name) = request.name {
        update = update.with_name(name);
    }
    if let Some(description) = request.description {
        update = update.with_description(description);
    }
    let workspace = state.db.workspaces().update(&id, &update).await?;
    Ok(ApiJson(workspace))
}

async fn delete_workspace(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let access = require_workspace_role(&state.db, caller.id(), &id, DELETE_WORKSPACE).await?;
    if access.workspace.is_personal() {
        return Err(ApiError::conflict("a personal workspace cannot be deleted"));
    }

    state.db.workspaces().delete(&id).await?;
    info!(workspace_id = %id, "deleted workspace");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Vec<WorkspaceMember>>, ApiError> {
    require_workspace_role(&state.db, caller.id(), &id, VIEW_WORKSPACE).await?;
    let members = state.db.memberships().list_workspace_members(&id).await?;
    Ok(ApiJson(members))
}

async fn add_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddMember>,
) -> Result<(StatusCode, ApiJson<WorkspaceMember>), ApiError> {
    let access = require_workspace_role(&state.db, caller.id(), &id, INVITE_MEMBER).await?;
    let role = assignable(request.role)?;
    if access.workspace.is_personal() {
        return Err(ApiError::conflict("a personal workspace cannot have other members"));
    }

    let user = state
        .db
        .users()
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no user with email '{}'", request.email)))?;
    let member = state
        .db
        .memberships()
        .add_workspace_member(&user.id, &id, role)
        .await?;
    Ok((StatusCode::CREATED, ApiJson(member)))
}

async fn change_member_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<ChangeRole>,
) -> Result<ApiJson<WorkspaceMember>, ApiError> {
    let access = require_workspace_role(&state.db, caller.id(), &id, CHANGE_MEMBER_ROLE).await?;
    validate_id(&user_id)?;
    let role = assignable(request.role)?;
    if access.workspace.owner_id == user_id {
        return Err(ApiError::conflict("the owner's role cannot be changed"));
    }

    let memberships = state.db.memberships();
    if memberships.workspace_role(&user_id, &id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "user '{}' is not a member of this workspace",
            user_id
        )));
    }
    let member = memberships.set_workspace_role(&user_id, &id, role).await?;
    Ok(ApiJson(member))
}

/// Remove a member. Owners and admins may remove others; any member may
/// leave. The owner can never be removed.
async fn remove_member(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let access = require_workspace_role(&state.db, caller.id(), &id, VIEW_WORKSPACE).await?;
    validate_id(&user_id)?;

    let leaving = caller.id() == user_id;
    if !leaving && !REMOVE_MEMBER.contains(&access.role) {
        return Err(ApiError::forbidden(DenyReason::RoleNotAllowed));
    }
    if access.workspace.owner_id == user_id {
        return Err(ApiError::conflict("the workspace owner cannot be removed"));
    }

    let memberships = state.db.memberships();
    if memberships.workspace_role(&user_id, &id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "user '{}' is not a member of this workspace",
            user_id
        )));
    }
    memberships.remove_workspace_member(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_project(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CreateProject>,
) -> Result<(StatusCode, ApiJson<Project>), ApiError> {
    require_workspace_role(&state.db, caller.id(), &id, CREATE_PROJECT).await?;
    let project = state
        .db
        .projects()
        .create(&id, &request.name, request.description.as_deref(), caller.id())
        .await?;
    info!(project_id = %project.id, workspace_id = %id, "created project");
    Ok((StatusCode::CREATED, ApiJson(project)))
}

async fn list_projects(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiJson<Vec<Project>>, ApiError> {
    require_workspace_role(&state.db, caller.id(), &id, VIEW_WORKSPACE).await?;
    let projects = state.db.projects().list_for_workspace(&id).await?;
    Ok(ApiJson(projects))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route(
            "/workspaces/{id}",
            get(get_workspace)
                .patch(update_workspace)
                .delete(delete_workspace),
        )
        .route("/workspaces/{id}/members", get(list_members).post(add_member))
        .route(
            "/workspaces/{id}/members/{user_id}",
            patch(change_member_role).delete(remove_member),
        )
        .route(
            "/workspaces/{id}/projects",
            get(list_projects).post(create_project),
        )
}
