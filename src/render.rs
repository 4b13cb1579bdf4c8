//! Page templates
//!
//! Templates are compiled into the binary and registered once at start-up.
//! Flash messages travel in the query string of the redirect that follows a
//! form submission.

use crate::app::AppState;
use crate::csrf::CsrfToken;
use crate::error::AppResult;
use axum::response::{Html, Redirect};
use handlebars::{Handlebars, TemplateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TEMPLATES: &[(&str, &str)] = &[
    ("index", include_str!("./templates/index.hbs")),
    ("login", include_str!("./templates/login.hbs")),
    ("register", include_str!("./templates/register.hbs")),
    ("projects", include_str!("./templates/projects.hbs")),
    ("project", include_str!("./templates/project.hbs")),
    ("task_form", include_str!("./templates/task_form.hbs")),
];

const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("./templates/header.hbs")),
    ("footer", include_str!("./templates/footer.hbs")),
];

/// One-shot message shown on the page after a redirect
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flash {
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Build the template registry
///
/// # Errors
/// * Returns an error if any template fails to compile
pub fn templates() -> Result<Handlebars<'static>, TemplateError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);

    for (name, source) in PARTIALS {
        registry.register_partial(name, *source)?;
    }
    for (name, source) in TEMPLATES {
        registry.register_template_string(name, *source)?;
    }

    Ok(registry)
}

/// Render a registered template with the given data
///
/// The request's CSRF token is added as `csrf_token` for the page's forms.
pub fn page(state: &AppState, csrf: &CsrfToken, name: &str, data: &Value) -> AppResult<Html<String>> {
    let mut data = data.clone();
    if let Value::Object(fields) = &mut data {
        fields.insert("csrf_token".to_string(), Value::from(csrf.as_str()));
    }
    Ok(Html(state.templates.render(name, &data)?))
}

pub fn redirect_with_message(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{}?message={}", path, urlencoding::encode(message)))
}

pub fn redirect_with_error(path: &str, error: &str) -> Redirect {
    Redirect::to(&format!("{}?error={}", path, urlencoding::encode(error)))
}
