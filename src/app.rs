use axum::{
    Extension, Router,
    extract::{Query, State},
    http::HeaderMap,
    middleware,
    response::Html,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use handlebars::Handlebars;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::csrf::{self, CsrfToken};
use crate::db::Database;
use crate::error::AppResult;
use crate::login::{self, SessionStore};
use crate::render::{self, Flash};
use crate::{api, projects, tasks};

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<SessionStore>,
    pub templates: Arc<Handlebars<'static>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the state, compiling the page templates
    pub fn new(db: Database, config: Config) -> Result<Self, handlebars::TemplateError> {
        Ok(Self {
            db,
            sessions: Arc::new(SessionStore::new(Duration::from_secs(config.session_ttl_secs))),
            templates: Arc::new(render::templates()?),
            config: Arc::new(config),
        })
    }
}

/// True for requests sent by the page scripts rather than a form submission
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("X-Requested-With")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "XMLHttpRequest")
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/logout", get(login::handle_logout))
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route("/projects/:project_id", get(projects::view_project))
        .route("/projects/:project_id/delete", post(projects::delete_project))
        .route(
            "/projects/:project_id/add_task",
            get(tasks::add_task_page).post(tasks::add_task),
        )
        .route(
            "/projects/:project_id/update_comment/:task_id",
            post(api::update_comment),
        )
        .route("/tasks", get(tasks::select_project))
        .route("/tasks/:task_id/edit", get(tasks::edit_task_page).post(tasks::edit_task))
        .route("/tasks/:task_id/delete", post(tasks::delete_task))
        .route("/api/projects/:project_id/tasks", get(api::project_tasks))
        .route(
            "/api/tasks/:task_id/comment",
            get(api::get_comment).post(api::set_comment),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), login::require_auth));

    Router::new()
        .route("/", get(serve_index))
        .route("/register", get(login::serve_register_page).post(login::handle_register))
        .route("/login", get(login::serve_login_page).post(login::handle_login))
        .merge(protected)
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn_with_state(state.clone(), csrf::verify))
        .with_state(state)
}

async fn serve_index(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    jar: CookieJar,
    Query(flash): Query<Flash>,
) -> AppResult<Html<String>> {
    let user = login::current_user(&state, &jar);
    render::page(
        &state,
        &csrf,
        "index",
        &json!({
            "title": "Home",
            "username": user.map(|u| u.username),
            "message": flash.message,
            "error": flash.error,
        }),
    )
}

/// Connect to the database and serve until the process is stopped
pub async fn run(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database_url).await?;
    db.init_schema().await?;
    log::info!("Database ready at {}", config.database_url);

    let addr = config.listen_addr();
    log::info!("Project delete policy: {:?}", config.delete_policy);
    let state = AppState::new(db, config)
        .map_err(|e| anyhow::anyhow!("failed to compile templates: {}", e))?;

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}
