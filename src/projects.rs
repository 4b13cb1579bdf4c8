use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::app::AppState;
use crate::chart;
use crate::csrf::CsrfToken;
use crate::db::{self, TaskOrder};
use crate::error::{AppError, AppResult};
use crate::forms::ProjectForm;
use crate::login::CurrentUser;
use crate::render::{self, Flash};

/// List the current user's projects, ordered by name
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    let projects = state.db.projects_for_user(user.id).await?;

    render::page(
        &state,
        &csrf,
        "projects",
        &json!({
            "title": "Projects",
            "username": user.username,
            "projects": projects,
            "message": flash.message,
            "error": flash.error,
        }),
    )
}

/// Create a project owned by the current user
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ProjectForm>,
) -> AppResult<Redirect> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(render::redirect_with_error("/projects", &errors.join(" "))),
    };

    let mut tx = state.db.begin().await?;
    let project_id = db::insert_project(&mut tx, user.id, &input).await?;
    tx.commit().await?;

    log::info!("User {} created project {} ({})", user.username, project_id, input.name);
    Ok(render::redirect_with_message(
        "/projects",
        &format!("Project \"{}\" created successfully!", input.name),
    ))
}

/// Delete a project, applying the configured delete policy to its tasks
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(project_id): Path<i64>,
) -> AppResult<Redirect> {
    let project = state.db.project(project_id).await?.ok_or(AppError::NotFound)?;
    if project.user_id != user.id {
        return Ok(render::redirect_with_error(
            "/projects",
            "You do not have permission to delete this project.",
        ));
    }

    let mut tx = state.db.begin().await?;
    match db::delete_project(&mut tx, project_id, state.config.delete_policy).await {
        Ok(removed_tasks) => {
            tx.commit().await?;
            log::info!(
                "User {} deleted project {} and {} task(s)",
                user.username,
                project_id,
                removed_tasks
            );
            Ok(render::redirect_with_message(
                "/projects",
                "Project and its tasks deleted successfully!",
            ))
        }
        Err(AppError::Conflict(message)) => Ok(render::redirect_with_error("/projects", &message)),
        Err(e) => {
            log::error!("Failed to delete project {}: {}", project_id, e);
            Ok(render::redirect_with_error(
                "/projects",
                "An error occurred while deleting the project.",
            ))
        }
    }
}

/// Project page: task table plus the Gantt chart
///
/// The chart records are embedded as a JSON string; the page script keeps
/// them fresh through the task API afterwards.
pub async fn view_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(project_id): Path<i64>,
    Query(flash): Query<Flash>,
) -> AppResult<Response> {
    let project = state
        .db
        .project_for_user(project_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let tasks = state.db.tasks_for_project(project.id, TaskOrder::Name).await?;

    let data = chart::derive(&tasks);
    let gantt_tasks_json = chart::gantt_json(&data.gantt_tasks);

    let page = render::page(
        &state,
        &csrf,
        "project",
        &json!({
            "title": project.name,
            "gantt": true,
            "username": user.username,
            "project": project,
            "tasks": data.tasks,
            "gantt_tasks_json": gantt_tasks_json,
            "message": flash.message,
            "error": flash.error,
        }),
    )?;
    Ok(page.into_response())
}
