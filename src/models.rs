use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered application user
///
/// Users are created at registration and never deleted.
#[cfg_attr(feature = "web", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Database identifier
    pub id: i64,

    /// Username (unique across the system)
    pub username: String,

    /// Argon2 hash of the user's password
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// A project owned by a single user
#[cfg_attr(feature = "web", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub user_id: i64,
}

/// A scheduled piece of work inside a project
///
/// `dependencies` holds the raw predecessor reference exactly as it was
/// submitted: one task name, or several names joined with commas. It is only
/// resolved to task identifiers when chart data is derived.
#[cfg_attr(feature = "web", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    pub status: String,
    pub dependencies: Option<String>,
    pub comment: Option<String>,
    pub project_id: i64,
    pub user_id: i64,
}

/// The fixed set of statuses a task can be given through the forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Blocked")]
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
    ];

    /// Display label, which is also the stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Blocked => "Blocked",
        }
    }

    /// Parses a stored or submitted status label (case-sensitive)
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == label)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
