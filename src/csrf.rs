//! Cross-site request forgery protection
//!
//! Every state-changing request must echo a token, either in the
//! `X-CSRF-Token` header (page scripts) or in a `csrf_token` form field
//! (plain forms). A logged-in user's token belongs to their session. Anonymous
//! visitors get one in the `csrf` cookie, which is what the login and
//! registration forms submit.

use axum::{
    Form,
    body::{Body, to_bytes},
    extract::{FromRequest, Request, State},
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::{AppState, is_ajax};
use crate::error::AppError;
use crate::login::SESSION_COOKIE;

/// Cookie carrying the token of an anonymous visitor
pub const CSRF_COOKIE: &str = "csrf";

/// Header the page scripts send the token in
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const MAX_FORM_BYTES: usize = 64 * 1024;
const REJECTED: &str = "Invalid or missing CSRF token.";

/// Token expected from the current request
///
/// Inserted into the request extensions by [`verify`] so pages can embed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// A fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenField {
    csrf_token: Option<String>,
}

fn token_cookie(value: String) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

/// CSRF middleware
///
/// Works out the expected token, rejects unsafe requests that do not echo it
/// with a 403, and issues an anonymous token cookie when none exists yet.
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let session_token = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.csrf_token(cookie.value()));
    let cookie_token = jar
        .get(CSRF_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    let (token, issued) = match session_token.or(cookie_token) {
        Some(token) => (CsrfToken(token), false),
        None => (CsrfToken::generate(), true),
    };

    let mut request = if is_safe(request.method()) {
        request
    } else {
        match checked(request, &token).await {
            Ok(request) => request,
            Err(response) => return response,
        }
    };

    request.extensions_mut().insert(token.clone());
    let response = next.run(request).await;

    if issued {
        (jar.add(token_cookie(token.into_inner())), response).into_response()
    } else {
        response
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Compares the submitted token, handing the request back with its body intact
async fn checked(request: Request, expected: &CsrfToken) -> Result<Request, Response> {
    let wants_json = request.uri().path().starts_with("/api/") || is_ajax(request.headers());

    let submitted = match request.headers().get(CSRF_HEADER) {
        Some(value) => value.to_str().ok().map(str::to_string),
        None => None,
    };
    let (request, submitted) = match submitted {
        Some(token) => (request, Some(token)),
        None => form_token(request).await,
    };

    if submitted.as_deref() == Some(expected.as_str()) {
        return Ok(request);
    }

    log::warn!("Rejected {} {}: bad CSRF token", request.method(), request.uri().path());
    let error = AppError::Forbidden(REJECTED.to_string());
    Err(if wants_json { error.into_json() } else { error.into_response() })
}

/// Reads the `csrf_token` field of a form body and rebuilds the request
async fn form_token(request: Request) -> (Request, Option<String>) {
    let Some(content_type) = request.headers().get(header::CONTENT_TYPE).cloned() else {
        return (request, None);
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return (Request::from_parts(parts, Body::empty()), None),
    };

    let token = match Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes.clone()))
    {
        Ok(copy) => match Form::<TokenField>::from_request(copy, &()).await {
            Ok(Form(field)) => field.csrf_token,
            Err(_) => None,
        },
        Err(_) => None,
    };

    (Request::from_parts(parts, Body::from(bytes)), token)
}
