//! SQLite persistence
//!
//! Reads go straight through the pool. Every write takes the connection of an
//! open transaction (see [`Database::begin`]); the caller decides whether to
//! commit it, and dropping it uncommitted rolls everything back.

use crate::config::DeletePolicy;
use crate::error::{AppError, AppResult};
use crate::forms::{ProjectInput, TaskInput};
use crate::models::{Project, Task, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT    NOT NULL UNIQUE,
        password_hash TEXT    NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL,
        description TEXT,
        user_id     INTEGER NOT NULL REFERENCES users(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        name         TEXT    NOT NULL,
        start_date   TEXT,
        end_date     TEXT,
        progress     INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
        status       TEXT    NOT NULL DEFAULT 'To Do',
        dependencies TEXT,
        comment      TEXT,
        project_id   INTEGER NOT NULL REFERENCES projects(id),
        user_id      INTEGER NOT NULL REFERENCES users(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id)",
];

const TASK_COLUMNS: &str =
    "id, name, start_date, end_date, progress, status, dependencies, comment, project_id, user_id";

/// Order in which a project's tasks are loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrder {
    Name,
    StartDate,
}

impl TaskOrder {
    fn to_sql(self) -> &'static str {
        match self {
            TaskOrder::Name => "name ASC, id ASC",
            TaskOrder::StartDate => "start_date ASC, id ASC",
        }
    }
}

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a connection pool, creating the database file if needed
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the tables if they don't exist
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Start a unit of work
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    // User operations
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, username, password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    // Project operations
    pub async fn projects_for_user(&self, user_id: i64) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, description, user_id FROM projects WHERE user_id = ? ORDER BY name ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn project(&self, id: i64) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT id, name, description, user_id FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Fetch a project only if it belongs to the given user
    pub async fn project_for_user(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, description, user_id FROM projects WHERE id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    // Task operations
    pub async fn tasks_for_project(
        &self,
        project_id: i64,
        order: TaskOrder,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks WHERE project_id = ? ORDER BY {}",
            TASK_COLUMNS,
            order.to_sql()
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn task(&self, id: i64) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}

/// Insert a user, returning the new id
///
/// # Errors
/// * `AppError::Conflict` if the username is already taken
pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
) -> AppResult<i64> {
    let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(&mut *conn)
        .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
            "Username already exists. Please choose a different one.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn insert_project(
    conn: &mut SqliteConnection,
    user_id: i64,
    project: &ProjectInput,
) -> AppResult<i64> {
    let done = sqlx::query("INSERT INTO projects (name, description, user_id) VALUES (?, ?, ?)")
        .bind(&project.name)
        .bind(&project.description)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(done.last_insert_rowid())
}

/// Delete a project according to the delete policy
///
/// # Returns
/// * `AppResult<u64>` - Number of tasks deleted along with the project
///
/// # Errors
/// * `AppError::Conflict` under [`DeletePolicy::Restrict`] when tasks remain
/// * `AppError::NotFound` if the project does not exist
pub async fn delete_project(
    conn: &mut SqliteConnection,
    project_id: i64,
    policy: DeletePolicy,
) -> AppResult<u64> {
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(&mut *conn)
        .await?;

    let removed_tasks = match policy {
        DeletePolicy::Restrict if remaining > 0 => {
            return Err(AppError::Conflict(format!(
                "Project still has {} task(s). Delete them first.",
                remaining
            )));
        }
        DeletePolicy::Restrict => 0,
        DeletePolicy::Cascade => sqlx::query("DELETE FROM tasks WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *conn)
            .await?
            .rows_affected(),
    };

    let deleted = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    Ok(removed_tasks)
}

pub async fn insert_task(
    conn: &mut SqliteConnection,
    project_id: i64,
    user_id: i64,
    task: &TaskInput,
) -> AppResult<i64> {
    let done = sqlx::query(
        r#"
        INSERT INTO tasks (name, start_date, end_date, progress, status, dependencies, comment, project_id, user_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.name)
    .bind(task.start_date)
    .bind(task.end_date)
    .bind(task.progress)
    .bind(task.status.as_str())
    .bind(&task.dependencies)
    .bind(&task.comment)
    .bind(project_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(done.last_insert_rowid())
}

/// Replace every editable field of a task
pub async fn update_task(conn: &mut SqliteConnection, task_id: i64, task: &TaskInput) -> AppResult<()> {
    let done = sqlx::query(
        r#"
        UPDATE tasks
        SET name = ?, start_date = ?, end_date = ?, progress = ?, status = ?,
            dependencies = ?, comment = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.name)
    .bind(task.start_date)
    .bind(task.end_date)
    .bind(task.progress)
    .bind(task.status.as_str())
    .bind(&task.dependencies)
    .bind(&task.comment)
    .bind(task_id)
    .execute(&mut *conn)
    .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn delete_task(conn: &mut SqliteConnection, task_id: i64) -> AppResult<()> {
    let done = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn set_task_comment(
    conn: &mut SqliteConnection,
    task_id: i64,
    comment: &str,
) -> AppResult<()> {
    let done = sqlx::query("UPDATE tasks SET comment = ? WHERE id = ?")
        .bind(comment)
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
