//! Data models for Tasktrack
//!
//! Defines Rust types that map to the SurrealDB schema for users,
//! workspaces, projects, roles, tasks and time entries, along with the
//! enums stored as constrained strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use surrealdb::sql::Thing;

/// Deserialize a SurrealDB record id (`table:key`) into its bare key.
fn record_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let thing = Thing::deserialize(deserializer)?;
    Ok(thing.id.to_raw())
}

/// Implements `as_str`, `Display`, `FromStr` and `ALL` for a string-backed enum.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the string representation used in the database
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(
                        "invalid {} '{}'. Valid values: {}",
                        $label,
                        s,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

/// Kind of workspace
///
/// Every user gets exactly one personal workspace at registration.
/// Group workspaces are created explicitly and can be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceKind {
    Personal,
    Group,
}

string_enum!(WorkspaceKind, "workspace kind", {
    Personal => "personal",
    Group => "group",
});

/// A user's role within a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

string_enum!(MemberRole, "member role", {
    Owner => "owner",
    Admin => "admin",
    Member => "member",
});

/// Named permission a project role can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "project:update")]
    ProjectUpdate,
    #[serde(rename = "member:manage")]
    MemberManage,
    #[serde(rename = "role:manage")]
    RoleManage,
    #[serde(rename = "task:create")]
    TaskCreate,
    #[serde(rename = "task:update")]
    TaskUpdate,
    #[serde(rename = "task:assign")]
    TaskAssign,
    #[serde(rename = "task:delete")]
    TaskDelete,
    #[serde(rename = "time:track")]
    TimeTrack,
}

string_enum!(Permission, "permission", {
    ProjectUpdate => "project:update",
    MemberManage => "member:manage",
    RoleManage => "role:manage",
    TaskCreate => "task:create",
    TaskUpdate => "task:update",
    TaskAssign => "task:assign",
    TaskDelete => "task:delete",
    TimeTrack => "time:track",
});

impl Permission {
    /// Human-readable description for the permission catalog
    pub fn description(&self) -> &'static str {
        match self {
            Permission::ProjectUpdate => "Edit project name and description",
            Permission::MemberManage => "Add, remove and re-role project members",
            Permission::RoleManage => "Create, edit and delete project roles",
            Permission::TaskCreate => "Create tasks",
            Permission::TaskUpdate => "Edit task fields and status",
            Permission::TaskAssign => "Change task assignees",
            Permission::TaskDelete => "Delete tasks",
            Permission::TimeTrack => "Track time against tasks",
        }
    }
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

string_enum!(TaskStatus, "status", {
    Todo => "todo",
    InProgress => "in_progress",
    Done => "done",
});

/// Task priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

string_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "record_key")]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A workspace holding projects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(deserialize_with = "record_key")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: WorkspaceKind,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    pub fn is_personal(&self) -> bool {
        self.kind == WorkspaceKind::Personal
    }
}

/// A user's membership in a workspace, joined with the user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMember {
    pub user_id: String,
    pub workspace_id: String,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// A project inside a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "record_key")]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a project, joined with the user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user_id: String,
    pub project_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role_id: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// A project-scoped role granting a set of permissions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRole {
    #[serde(deserialize_with = "record_key")]
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRole {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// A unit of work inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "record_key")]
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    pub creator_id: String,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Completed pomodoro sessions tracked against this task
    #[serde(default)]
    pub pomodoros: i64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A span of time a user spent on a task
///
/// A running timer is an entry without `ended_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    #[serde(deserialize_with = "record_key")]
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seconds: Option<i64>,
    #[serde(default)]
    pub pomodoro: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    /// True for a finished pomodoro entry that lasted at least `length`.
    pub fn completes_pomodoro(&self, length: chrono::Duration) -> bool {
        self.pomodoro && self.seconds.is_some_and(|s| s >= length.num_seconds())
    }
}

/// Seconds tracked by one user on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTime {
    pub user_id: String,
    pub seconds: i64,
}

/// Aggregated time tracked on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSummary {
    pub task_id: String,
    pub total_seconds: i64,
    pub pomodoros: i64,
    pub entries: usize,
    pub by_user: Vec<UserTime>,
}
