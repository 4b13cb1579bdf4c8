use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by request handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("validation failed: {}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Template(_) | AppError::PasswordHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Template(_) | AppError::PasswordHash(_) => {
                "An unexpected server error occurred.".to_string()
            }
            AppError::Validation(errors) => errors.join(" "),
            AppError::Unauthorized => "Please log in to access this page.".to_string(),
            AppError::Forbidden(message) | AppError::Conflict(message) => message.clone(),
            AppError::NotFound => "Not found".to_string(),
        }
    }

    /// JSON body in the shape the XHR callers expect
    pub fn into_json(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => json!({ "success": false, "errors": errors }),
            _ => json!({ "success": false, "message": self.public_message() }),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (self.status(), self.public_message()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
