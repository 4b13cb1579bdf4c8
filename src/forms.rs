//! Form input parsing
//!
//! Raw form fields are turned into validated values here, once, before they
//! reach the database or the chart code. Validation collects every problem
//! instead of stopping at the first, so a form can show all messages at once.

use crate::chart::DEPENDENCY_PLACEHOLDER;
use crate::models::TaskStatus;
use chrono::NaiveDate;
use serde::Deserialize;

/// Dropdown value that hands the task name over to the free-text field
pub const OTHER_TASK_NAME: &str = "Other";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Task name as chosen on the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskNameInput {
    /// Picked from the dropdown of common task names
    Preset(String),
    /// Typed into the "other" text field
    Custom(String),
}

impl TaskNameInput {
    /// Resolves the dropdown and the "other" field into one name
    ///
    /// A non-empty dropdown value wins unless it is the [`OTHER_TASK_NAME`]
    /// sentinel, in which case the text field is used.
    ///
    /// # Returns
    /// * `Option<TaskNameInput>` - `None` when neither field carries a name
    pub fn from_fields(preset: Option<&str>, custom: Option<&str>) -> Option<Self> {
        let preset = preset
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != OTHER_TASK_NAME);
        if let Some(name) = preset {
            return Some(TaskNameInput::Preset(name.to_string()));
        }

        custom
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| TaskNameInput::Custom(c.to_string()))
    }

    pub fn into_name(self) -> String {
        match self {
            TaskNameInput::Preset(name) | TaskNameInput::Custom(name) => name,
        }
    }
}

/// Fields submitted by the add-task and edit-task forms
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskForm {
    pub task_name: Option<String>,
    pub task_name_other: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub progress: Option<String>,
    pub status: Option<String>,
    /// Multi-select; one entry per selected predecessor
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub comment: Option<String>,
}

/// A task form that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInput {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    pub status: TaskStatus,
    pub dependencies: Option<String>,
    pub comment: Option<String>,
}

impl TaskForm {
    /// Validates the submitted fields
    ///
    /// # Returns
    /// * `Result<TaskInput, Vec<String>>` - The parsed task, or every
    ///   validation message that applies
    ///
    /// # Errors
    /// * Missing name or status
    /// * Progress that is not a whole number in `0..=100` (never clamped)
    /// * Malformed dates, or an end date before the start date
    pub fn validate(&self) -> Result<TaskInput, Vec<String>> {
        let mut errors = Vec::new();

        let name = TaskNameInput::from_fields(
            self.task_name.as_deref(),
            self.task_name_other.as_deref(),
        );
        if name.is_none() {
            errors.push("Task name is required.".to_string());
        }

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("Status is required.".to_string());
                None
            }
            Some(label) => {
                let parsed = TaskStatus::parse(label);
                if parsed.is_none() {
                    errors.push(format!(
                        "Status must be one of: {}.",
                        TaskStatus::ALL.map(|s| s.as_str()).join(", ")
                    ));
                }
                parsed
            }
        };

        let progress = match parse_progress(self.progress.as_deref()) {
            Ok(progress) => progress,
            Err(message) => {
                errors.push(message);
                0
            }
        };

        let start_date = parse_date(self.start_date.as_deref(), "Start date", &mut errors);
        let end_date = parse_date(self.end_date.as_deref(), "End date", &mut errors);
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                errors.push("End date cannot be before start date.".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        match (name, status) {
            (Some(name), Some(status)) => Ok(TaskInput {
                name: name.into_name(),
                start_date,
                end_date,
                progress,
                status,
                dependencies: join_dependencies(&self.dependencies),
                comment: self
                    .comment
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            }),
            // Both are only None when an error was recorded above
            _ => Err(errors),
        }
    }
}

/// Parses the progress field; a missing field means zero
pub fn parse_progress(raw: Option<&str>) -> Result<i32, String> {
    let Some(raw) = raw else {
        return Ok(0);
    };

    match raw.trim().parse::<i32>() {
        Ok(progress) if (0..=100).contains(&progress) => Ok(progress),
        Ok(_) => Err("Progress must be between 0 and 100.".to_string()),
        Err(_) => Err("Progress must be a valid number.".to_string()),
    }
}

fn parse_date(raw: Option<&str>, label: &str, errors: &mut Vec<String>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(format!("{} must be a valid date (YYYY-MM-DD).", label));
            None
        }
    }
}

/// Joins the selected predecessors into the stored reference
///
/// Selecting the placeholder anywhere clears the dependency.
pub fn join_dependencies(selected: &[String]) -> Option<String> {
    if selected.iter().any(|d| d == DEPENDENCY_PLACEHOLDER) {
        return None;
    }

    let names: Vec<&str> = selected
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(","))
    }
}

/// Fields of the create-project form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectForm {
    pub project_name: Option<String>,
    pub description: Option<String>,
}

/// A project form that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInput {
    pub name: String,
    pub description: Option<String>,
}

impl ProjectForm {
    pub fn validate(&self) -> Result<ProjectInput, Vec<String>> {
        let name = self
            .project_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        match name {
            Some(name) => Ok(ProjectInput {
                name: name.to_string(),
                description: self
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            }),
            None => Err(vec!["Project name is required!".to_string()]),
        }
    }
}
