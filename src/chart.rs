//! Chart data derivation
//!
//! Turns the tasks of one project into the two shapes the presentation layer
//! needs: a flat list for the task table and ordered Gantt bars for the
//! timeline. Both the project page and the polling API go through [`derive`].

use crate::models::Task;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Dependency value the forms submit for "no predecessor"
pub const DEPENDENCY_PLACEHOLDER: &str = "None";

/// Style tag of a Gantt bar, derived from the task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VisualClass {
    #[serde(rename = "bar-green")]
    Green,
    #[serde(rename = "bar-yellow")]
    Yellow,
    #[serde(rename = "bar-red")]
    Red,
    #[serde(rename = "bar-blue")]
    Blue,
}

impl VisualClass {
    /// Maps a status label to its bar colour
    ///
    /// The match is exact and case-sensitive. Anything that is not one of the
    /// three highlighted statuses, "To Do" included, is drawn blue.
    pub fn for_status(status: &str) -> Self {
        match status {
            "Completed" => VisualClass::Green,
            "In Progress" => VisualClass::Yellow,
            "Blocked" => VisualClass::Red,
            _ => VisualClass::Blue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualClass::Green => "bar-green",
            VisualClass::Yellow => "bar-yellow",
            VisualClass::Red => "bar-red",
            VisualClass::Blue => "bar-blue",
        }
    }
}

/// Row of the task table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskListItem {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub progress: i32,
    pub status: String,
    pub comment: String,
}

/// One bar of the Gantt chart
///
/// `dependencies` is left out of the serialized record entirely when the
/// task's predecessor reference did not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttRecord {
    pub id: String,
    pub name: String,
    pub start: String,
    pub end: String,
    pub progress: i32,
    pub custom_class: VisualClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
    pub comment: String,
}

/// Both views of a project's tasks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub tasks: Vec<TaskListItem>,
    pub gantt_tasks: Vec<GanttRecord>,
}

/// Formats a date as `YYYY-MM-DD`, or an empty string when absent
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Derives the list and chart views of a project's tasks
///
/// # Arguments
/// * `tasks` - All tasks of a single project, in any order
///
/// # Returns
/// * `ChartData` - One list row per task, and one Gantt record per task that
///   has both a start and an end date, sorted by start date
///
/// # Examples
/// ```
/// use gantt_tracker::chart::derive;
///
/// let data = derive(&[]);
/// assert!(data.tasks.is_empty());
/// assert!(data.gantt_tasks.is_empty());
/// ```
pub fn derive(tasks: &[Task]) -> ChartData {
    ChartData {
        tasks: list_items(tasks),
        gantt_tasks: gantt_records(tasks),
    }
}

/// Builds the task table rows, preserving input order
pub fn list_items(tasks: &[Task]) -> Vec<TaskListItem> {
    tasks
        .iter()
        .map(|task| TaskListItem {
            id: task.id.to_string(),
            name: task.name.clone(),
            start_date: format_date(task.start_date),
            end_date: format_date(task.end_date),
            progress: task.progress,
            status: task.status.clone(),
            comment: task.comment.clone().unwrap_or_default(),
        })
        .collect()
}

/// Builds the Gantt records for every fully dated task
///
/// Undated tasks are skipped. The result is ordered by start date; tasks
/// starting on the same day keep their input order.
pub fn gantt_records(tasks: &[Task]) -> Vec<GanttRecord> {
    let index = NameIndex::new(tasks);

    let mut records: Vec<GanttRecord> = tasks
        .iter()
        .filter(|task| task.start_date.is_some() && task.end_date.is_some())
        .map(|task| GanttRecord {
            id: task.id.to_string(),
            name: task.name.clone(),
            start: format_date(task.start_date),
            end: format_date(task.end_date),
            progress: task.progress,
            custom_class: VisualClass::for_status(&task.status),
            dependencies: task
                .dependencies
                .as_deref()
                .and_then(|raw| index.resolve(raw)),
            comment: task.comment.clone().unwrap_or_default(),
        })
        .collect();

    // ISO dates compare chronologically as strings; sort_by is stable
    records.sort_by(|a, b| a.start.cmp(&b.start));
    records
}

/// Serializes Gantt records for embedding in a page
///
/// Falls back to an empty array if serialization fails. `</` is escaped so the
/// output can sit inside a `<script>` element.
pub fn gantt_json(records: &[GanttRecord]) -> String {
    match serde_json::to_string(records) {
        Ok(json) => json.replace("</", "<\\/"),
        Err(e) => {
            log::warn!("Failed to serialize Gantt data, rendering empty chart: {}", e);
            "[]".to_string()
        }
    }
}

/// Trimmed task name to task id, scoped to one project's tasks
struct NameIndex<'a> {
    ids: HashMap<&'a str, String>,
}

impl<'a> NameIndex<'a> {
    fn new(tasks: &'a [Task]) -> Self {
        let ids = tasks
            .iter()
            .map(|task| (task.name.trim(), task.id.to_string()))
            .collect();
        Self { ids }
    }

    /// Resolves a raw dependency reference to task ids
    ///
    /// The whole reference is tried first, so a single name containing a comma
    /// still resolves. Otherwise it is read as a comma-joined list and the ids
    /// that resolve are joined with commas.
    fn resolve(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == DEPENDENCY_PLACEHOLDER {
            return None;
        }

        if let Some(id) = self.ids.get(raw) {
            return Some(id.clone());
        }

        let resolved: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != DEPENDENCY_PLACEHOLDER)
            .filter_map(|name| self.ids.get(name).map(String::as_str))
            .collect();

        if resolved.is_empty() {
            None
        } else {
            Some(resolved.join(","))
        }
    }
}
