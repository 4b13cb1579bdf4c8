//! JSON endpoints used by the project page scripts

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::AppState;
use crate::chart::{self, GanttRecord, TaskListItem};
use crate::db::{self, TaskOrder};
use crate::error::{AppError, AppResult};
use crate::login::CurrentUser;
use crate::tasks::owned_task;

/// Body of `GET /api/projects/:id/tasks`
///
/// The chart records travel under `gantt_tasks`; clients polling the endpoint
/// depend on that key.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub success: bool,
    pub tasks: Vec<TaskListItem>,
    pub gantt_tasks: Vec<GanttRecord>,
    pub messages: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentPayload {
    pub comment: Option<String>,
}

/// Task list and chart records of one of the user's projects
pub async fn project_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> Response {
    let result: AppResult<TaskListResponse> = async {
        let project = state
            .db
            .project_for_user(project_id, user.id)
            .await?
            .ok_or(AppError::NotFound)?;
        let tasks = state.db.tasks_for_project(project.id, TaskOrder::StartDate).await?;
        log::debug!("Fetched {} task(s) for project {}", tasks.len(), project.id);

        let data = chart::derive(&tasks);
        Ok(TaskListResponse {
            success: true,
            tasks: data.tasks,
            gantt_tasks: data.gantt_tasks,
            messages: Vec::new(),
        })
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_json(),
    }
}

/// Read a task's comment
pub async fn get_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
) -> Response {
    match owned_task(&state, &user, task_id, "Unauthorized").await {
        Ok((task, _)) => Json(json!({
            "success": true,
            "comment": task.comment.unwrap_or_default(),
        }))
        .into_response(),
        Err(e) => e.into_json(),
    }
}

/// Replace a task's comment; an empty comment clears it
pub async fn set_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    Json(payload): Json<CommentPayload>,
) -> Response {
    let comment = payload.comment.as_deref().unwrap_or_default().trim().to_string();

    let result = async {
        let (task, _) = owned_task(&state, &user, task_id, "Unauthorized").await?;
        save_comment(&state, task.id, &comment).await
    }
    .await;

    match result {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Comment updated successfully!",
            "comment": comment,
        }))
        .into_response(),
        Err(e) => comment_error(e, "Error saving comment"),
    }
}

/// Comment update scoped to a project; a blank comment is rejected
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((project_id, task_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentPayload>,
) -> Response {
    let (task, _) = match owned_task(&state, &user, task_id, "Unauthorized").await {
        Ok((task, _)) if task.project_id != project_id => {
            return AppError::Forbidden("Unauthorized".to_string()).into_json();
        }
        Ok(found) => found,
        Err(e) => return e.into_json(),
    };

    let comment = payload.comment.as_deref().map(str::trim).unwrap_or_default();
    if comment.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "No comment" })),
        )
            .into_response();
    }

    match save_comment(&state, task.id, comment).await {
        Ok(()) => Json(json!({ "success": true, "message": "Comment updated!" })).into_response(),
        Err(e) => comment_error(e, "Error"),
    }
}

async fn save_comment(state: &AppState, task_id: i64, comment: &str) -> AppResult<()> {
    let mut tx = state.db.begin().await?;
    db::set_task_comment(&mut tx, task_id, comment).await?;
    tx.commit().await?;
    log::info!("Comment updated on task {}", task_id);
    Ok(())
}

fn comment_error(error: AppError, prefix: &str) -> Response {
    if error.status().is_server_error() {
        log::error!("{} on comment update: {}", prefix, error);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": format!("{}: {}", prefix, error.public_message()) })),
        )
            .into_response();
    }
    error.into_json()
}
