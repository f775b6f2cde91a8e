//! Task filtering
//!
//! `TaskFilter` is a builder describing which tasks of a project to list.
//! Criteria use OR semantics within the same kind (several statuses means
//! "any of these") and AND semantics across kinds.

use crate::models::{Priority, TaskStatus};

/// Who a listed task must be assigned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeFilter {
    /// Assigned to this user
    User(String),
    /// Not assigned to anyone
    Unassigned,
}

/// Filter criteria for listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to one project
    pub project_id: Option<String>,
    /// Filter by statuses (OR semantics)
    pub statuses: Vec<TaskStatus>,
    /// Filter by priorities (OR semantics)
    pub priorities: Vec<Priority>,
    pub assignee: Option<AssigneeFilter>,
    /// Case-insensitive substring of the title
    pub query: Option<String>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priorities.push(priority);
        self
    }

    pub fn with_priorities(mut self, priorities: impl IntoIterator<Item = Priority>) -> Self {
        self.priorities.extend(priorities);
        self
    }

    pub fn assigned_to(mut self, user_id: impl Into<String>) -> Self {
        self.assignee = Some(AssigneeFilter::User(user_id.into()));
        self
    }

    pub fn unassigned(mut self) -> Self {
        self.assignee = Some(AssigneeFilter::Unassigned);
        self
    }

    /// Match titles containing `query`. Blank queries are ignored.
    pub fn matching(mut self, query: impl Into<String>) -> Self {
        let query = query.into().trim().to_lowercase();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Build the `WHERE` conditions for this filter.
    ///
    /// Conditions reference `$project_id`, `$statuses`, `$priorities`,
    /// `$assignee` and `$query`; see [`TaskFilter::bindings`].
    pub(crate) fn conditions(&self) -> Vec<&'static str> {
        let mut conditions = Vec::new();

        if self.project_id.is_some() {
            conditions.push("project_id = $project_id");
        }
        if !self.statuses.is_empty() {
            conditions.push("status IN $statuses");
        }
        if !self.priorities.is_empty() {
            conditions.push("priority IN $priorities");
        }
        match &self.assignee {
            Some(AssigneeFilter::User(_)) => conditions.push("assignee_id = $assignee"),
            Some(AssigneeFilter::Unassigned) => conditions.push("assignee_id = NONE"),
            None => {}
        }
        if self.query.is_some() {
            conditions.push("string::contains(string::lowercase(title), $query)");
        }

        conditions
    }

    /// Values bound for the placeholders used by [`TaskFilter::conditions`].
    pub(crate) fn bindings(&self) -> FilterBindings {
        FilterBindings {
            project_id: self.project_id.clone(),
            statuses: self.statuses.iter().map(|s| s.as_str()).collect(),
            priorities: self.priorities.iter().map(|p| p.as_str()).collect(),
            assignee: match &self.assignee {
                Some(AssigneeFilter::User(id)) => Some(id.clone()),
                _ => None,
            },
            query: self.query.clone(),
        }
    }

    /// Full `SELECT` statement for this filter, oldest task first.
    pub(crate) fn to_query(&self) -> String {
        let conditions = self.conditions();
        if conditions.is_empty() {
            "SELECT * FROM task ORDER BY created_at ASC".to_string()
        } else {
            format!(
                "SELECT * FROM task WHERE {} ORDER BY created_at ASC",
                conditions.join(" AND ")
            )
        }
    }
}

/// Owned query parameters for a [`TaskFilter`]
#[derive(Debug, Default)]
pub(crate) struct FilterBindings {
    pub project_id: Option<String>,
    pub statuses: Vec<&'static str>,
    pub priorities: Vec<&'static str>,
    pub assignee: Option<String>,
    pub query: Option<String>,
}
