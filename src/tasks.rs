//! Task pages
//!
//! Each mutating handler answers in two ways: page scripts that send
//! `X-Requested-With: XMLHttpRequest` get JSON, plain form posts get a
//! redirect carrying a flash message.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde_json::{Value, json};

use crate::app::{AppState, is_ajax};
use crate::chart;
use crate::csrf::CsrfToken;
use crate::db::{self, TaskOrder};
use crate::error::{AppError, AppResult};
use crate::forms::{OTHER_TASK_NAME, TaskForm};
use crate::login::CurrentUser;
use crate::models::{Project, Task, TaskStatus};
use crate::render::{self, Flash};

/// Common task names offered in the name dropdown
pub const PRESET_TASK_NAMES: &[&str] = &[
    "Planning",
    "Requirements",
    "Design",
    "Development",
    "Testing",
    "Deployment",
    "Review",
    OTHER_TASK_NAME,
];

/// Load a task and its project, checking the current user owns the project
///
/// # Errors
/// * `AppError::NotFound` if the task does not exist
/// * `AppError::Forbidden` with `denied` as message if the user is not the owner
pub(crate) async fn owned_task(
    state: &AppState,
    user: &CurrentUser,
    task_id: i64,
    denied: &str,
) -> AppResult<(Task, Project)> {
    let task = state.db.task(task_id).await?.ok_or(AppError::NotFound)?;
    let project = state
        .db
        .project(task.project_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if project.user_id != user.id {
        return Err(AppError::Forbidden(denied.to_string()));
    }
    Ok((task, project))
}

async fn owned_project(
    state: &AppState,
    user: &CurrentUser,
    project_id: i64,
    denied: &str,
) -> AppResult<Project> {
    let project = state.db.project(project_id).await?.ok_or(AppError::NotFound)?;
    if project.user_id != user.id {
        return Err(AppError::Forbidden(denied.to_string()));
    }
    Ok(project)
}

/// Refusal in the shape the caller expects
fn refuse(ajax: bool, error: AppError, fallback: &str) -> Response {
    match error {
        AppError::Forbidden(message) if !ajax => {
            render::redirect_with_error(fallback, &message).into_response()
        }
        error if ajax => error.into_json(),
        error => error.into_response(),
    }
}

/// Values the task form is pre-filled with
fn form_values(form: &TaskForm) -> Value {
    json!({
        "task_name": form.task_name,
        "task_name_other": form.task_name_other,
        "start_date": form.start_date,
        "end_date": form.end_date,
        "progress": form.progress,
        "status": form.status,
        "comment": form.comment,
    })
}

fn form_from_task(task: &Task) -> TaskForm {
    let preset =
        task.name != OTHER_TASK_NAME && PRESET_TASK_NAMES.iter().any(|p| *p == task.name);
    TaskForm {
        task_name: preset.then(|| task.name.clone()),
        task_name_other: (!preset).then(|| task.name.clone()),
        start_date: Some(chart::format_date(task.start_date)),
        end_date: Some(chart::format_date(task.end_date)),
        progress: Some(task.progress.to_string()),
        status: Some(task.status.clone()),
        dependencies: task.dependencies.iter().cloned().collect(),
        comment: task.comment.clone(),
    }
}

/// Predecessor names to pre-select in the dependency list
///
/// Each entry is matched whole against the candidate names first, so a
/// stored reference to a task whose name contains a comma stays selected.
/// Otherwise the entry is read as a comma-joined list of names.
pub fn selected_dependencies<'a>(entries: &'a [String], names: &[&str]) -> Vec<&'a str> {
    entries
        .iter()
        .map(|entry| entry.trim())
        .flat_map(|entry| {
            if names.contains(&entry) {
                vec![entry]
            } else {
                entry
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            }
        })
        .collect()
}

/// Render the add/edit form
///
/// Every task of the project, the edited one included, is offered as a
/// possible predecessor.
async fn task_form_page(
    state: &AppState,
    csrf: &CsrfToken,
    user: &CurrentUser,
    project: &Project,
    task: Option<&Task>,
    form: &TaskForm,
    errors: &[String],
) -> AppResult<Response> {
    let siblings = state.db.tasks_for_project(project.id, TaskOrder::Name).await?;
    let names: Vec<&str> = siblings.iter().map(|t| t.name.trim()).collect();
    let selected = selected_dependencies(&form.dependencies, &names);
    let candidates: Vec<Value> = names
        .iter()
        .map(|name| json!({ "name": name, "selected": selected.contains(name) }))
        .collect();

    let action = match task {
        Some(task) => format!("/tasks/{}/edit", task.id),
        None => format!("/projects/{}/add_task", project.id),
    };

    let page = render::page(
        state,
        csrf,
        "task_form",
        &json!({
            "title": if task.is_some() { "Edit Task" } else { "Add Task" },
            "username": user.username,
            "project": project,
            "task": task,
            "action": action,
            "form": form_values(form),
            "presets": PRESET_TASK_NAMES,
            "statuses": TaskStatus::ALL.map(|s| s.as_str()),
            "candidates": candidates,
            "errors": errors,
        }),
    )?;

    let status = if errors.is_empty() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    Ok((status, page).into_response())
}

/// `GET /tasks` has nothing to show without a project
pub async fn select_project() -> Redirect {
    render::redirect_with_message("/projects", "Please select a project to view/manage tasks.")
}

pub async fn add_task_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(project_id): Path<i64>,
) -> Response {
    let denied = "You do not have permission to add tasks to this project.";
    let project = match owned_project(&state, &user, project_id, denied).await {
        Ok(project) => project,
        Err(e) => return refuse(false, e, "/projects"),
    };

    let form = TaskForm {
        progress: Some("0".to_string()),
        status: Some(TaskStatus::default().as_str().to_string()),
        ..TaskForm::default()
    };
    task_form_page(&state, &csrf, &user, &project, None, &form, &[])
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// Create a task in a project
pub async fn add_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(project_id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<TaskForm>,
) -> Response {
    let ajax = is_ajax(&headers);
    let denied = "You do not have permission to add tasks to this project.";
    let project = match owned_project(&state, &user, project_id, denied).await {
        Ok(project) => project,
        Err(e) => return refuse(ajax, e, "/projects"),
    };

    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) if ajax => return AppError::Validation(errors).into_json(),
        Err(errors) => {
            return task_form_page(&state, &csrf, &user, &project, None, &form, &errors)
                .await
                .unwrap_or_else(IntoResponse::into_response);
        }
    };

    let result = async {
        let mut tx = state.db.begin().await?;
        let task_id = db::insert_task(&mut tx, project.id, user.id, &input).await?;
        tx.commit().await?;
        Ok::<_, AppError>(task_id)
    }
    .await;

    match result {
        Ok(task_id) => {
            log::info!(
                "Task {} ({}) added to project {} with dependency {:?}",
                task_id,
                input.name,
                project.id,
                input.dependencies
            );
            if ajax {
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "success": true,
                        "message": "Task added successfully!",
                        "task_id": task_id,
                        "project_id": project.id,
                    })),
                )
                    .into_response()
            } else {
                render::redirect_with_message(
                    &format!("/projects/{}", project.id),
                    "Task added successfully!",
                )
                .into_response()
            }
        }
        Err(e) => refuse(ajax, e, "/projects"),
    }
}

pub async fn edit_task_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(task_id): Path<i64>,
    Query(flash): Query<Flash>,
) -> Response {
    let denied = "You do not have permission to edit this task.";
    let (task, project) = match owned_task(&state, &user, task_id, denied).await {
        Ok(found) => found,
        Err(e) => return refuse(false, e, "/projects"),
    };

    let errors: Vec<String> = flash.error.into_iter().collect();
    task_form_page(&state, &csrf, &user, &project, Some(&task), &form_from_task(&task), &errors)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// Replace every field of a task with the submitted values
pub async fn edit_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(task_id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<TaskForm>,
) -> Response {
    let ajax = is_ajax(&headers);
    let denied = "You do not have permission to edit this task.";
    let (task, project) = match owned_task(&state, &user, task_id, denied).await {
        Ok(found) => found,
        Err(e) => return refuse(ajax, e, "/projects"),
    };

    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) if ajax => return AppError::Validation(errors).into_json(),
        Err(errors) => {
            return task_form_page(&state, &csrf, &user, &project, Some(&task), &form, &errors)
                .await
                .unwrap_or_else(IntoResponse::into_response);
        }
    };

    let result = async {
        let mut tx = state.db.begin().await?;
        db::update_task(&mut tx, task.id, &input).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    match result {
        Ok(()) => {
            log::info!(
                "Task {} ({}) updated with dependency {:?}",
                task.id,
                input.name,
                input.dependencies
            );
            if ajax {
                Json(json!({
                    "success": true,
                    "message": "Task updated successfully!",
                    "task_id": task.id,
                    "project_id": project.id,
                }))
                .into_response()
            } else {
                render::redirect_with_message(
                    &format!("/projects/{}", project.id),
                    "Task updated successfully!",
                )
                .into_response()
            }
        }
        Err(e) => refuse(ajax, e, "/projects"),
    }
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let ajax = is_ajax(&headers);
    let denied = "You do not have permission to delete this task.";
    let (task, project) = match owned_task(&state, &user, task_id, denied).await {
        Ok(found) => found,
        Err(e) => return refuse(ajax, e, "/projects"),
    };
    let project_page = format!("/projects/{}", project.id);

    let result = async {
        let mut tx = state.db.begin().await?;
        db::delete_task(&mut tx, task.id).await?;
        tx.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    match result {
        Ok(()) => {
            log::info!("Task {} deleted from project {}", task.id, project.id);
            if ajax {
                Json(json!({ "success": true, "message": "Task deleted successfully!" }))
                    .into_response()
            } else {
                render::redirect_with_message(&project_page, "Task deleted successfully!")
                    .into_response()
            }
        }
        Err(e) => {
            log::error!("Error deleting task {}: {}", task.id, e);
            let message = "An unexpected server error occurred while deleting the task.";
            if ajax {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": message })),
                )
                    .into_response()
            } else {
                render::redirect_with_error(&project_page, message).into_response()
            }
        }
    }
}
