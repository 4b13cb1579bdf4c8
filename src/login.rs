#![cfg(not(tarpaulin_include))]

use crate::app::{AppState, is_ajax};
use crate::csrf::CsrfToken;
use crate::db::{self, Database};
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::render::{self, Flash};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Form,
    extract::{Query, Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 6;

/// Registration form data
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    #[serde(default)]
    pub password: String,

    /// Must repeat `password` exactly
    #[serde(default)]
    pub confirm_password: String,
}

/// Login form data
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Query string of the login page
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Where to go after a successful login
    pub next: Option<String>,
    #[serde(flatten)]
    pub flash: Flash,
}

/// The authenticated user of a request
///
/// Inserted into the request extensions by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    pub user: CurrentUser,

    /// Token every state-changing request of this session must echo
    pub csrf_token: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// In-memory store of active login sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a new session for an authenticated user
    ///
    /// # Returns
    /// * `String` - A unique session ID
    pub fn create(&self, user: CurrentUser) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            user,
            csrf_token: CsrfToken::generate().into_inner(),
            expires_at: SystemTime::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// Checks if a session is valid and not expired
    ///
    /// # Returns
    /// * `Option<CurrentUser>` - The session's user if valid, None otherwise
    pub fn validate(&self, session_id: &str) -> Option<CurrentUser> {
        self.get(session_id).map(|session| session.user)
    }

    /// CSRF token of a live session
    pub fn csrf_token(&self, session_id: &str) -> Option<String> {
        self.get(session_id).map(|session| session.csrf_token)
    }

    fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);

        sessions
            .get(session_id)
            .filter(|session| session.expires_at > SystemTime::now())
            .cloned()
    }

    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
    }
}

/// Hash a password using Argon2
///
/// # Errors
/// * Returns an error if the password hashing fails
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `AppResult<bool>` - True if the password matches, false if not
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check the registration form fields
///
/// Username uniqueness is checked against the database by [`register_user`].
pub fn validate_registration(form: &RegisterForm) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let username_len = form.username.trim().chars().count();

    if username_len == 0 {
        errors.push("Username is required.".to_string());
    } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
        errors.push(format!(
            "Username must be between {} and {} characters long.",
            USERNAME_MIN, USERNAME_MAX
        ));
    }

    if form.password.is_empty() {
        errors.push("Password is required.".to_string());
    } else if form.password.chars().count() < PASSWORD_MIN {
        errors.push(format!(
            "Password must be at least {} characters long.",
            PASSWORD_MIN
        ));
    }

    if form.confirm_password != form.password {
        errors.push("Passwords must match.".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Register a new user
///
/// The password is hashed before storage.
///
/// # Returns
/// * `AppResult<i64>` - The id of the new user
///
/// # Errors
/// * `AppError::Validation` if the form fields are invalid or the username is taken
pub async fn register_user(db: &Database, form: &RegisterForm) -> AppResult<i64> {
    validate_registration(form).map_err(AppError::Validation)?;

    let username = form.username.trim();
    if db.find_user_by_username(username).await?.is_some() {
        return Err(AppError::Validation(vec![
            "Username already exists. Please choose a different one.".to_string(),
        ]));
    }

    let password_hash = hash_password(&form.password)?;

    let mut tx = db.begin().await?;
    let user_id = match db::insert_user(&mut tx, username, &password_hash).await {
        Err(AppError::Conflict(message)) => return Err(AppError::Validation(vec![message])),
        other => other?,
    };
    tx.commit().await?;

    log::info!("Registered user {} (id {})", username, user_id);
    Ok(user_id)
}

/// Verify user credentials
///
/// # Returns
/// * `AppResult<Option<User>>` - The user if the credentials match
pub async fn authenticate(db: &Database, username: &str, password: &str) -> AppResult<Option<User>> {
    let Some(user) = db.find_user_by_username(username.trim()).await? else {
        return Ok(None);
    };

    if verify_password(password, &user.password_hash)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Resolves the session cookie of a request to its user
pub fn current_user(state: &AppState, jar: &CookieJar) -> Option<CurrentUser> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.validate(cookie.value()))
}

/// Only same-site absolute paths are accepted as a post-login target
///
/// Browsers drop tabs and line breaks from URLs, so any control character is
/// refused before the `//` check.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        !n.chars().any(char::is_control)
            && n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && HeaderValue::from_str(n).is_ok()
    })
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Serve the signup page
pub async fn serve_register_page(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    jar: CookieJar,
) -> AppResult<Response> {
    if current_user(&state, &jar).is_some() {
        return Ok(Redirect::to("/projects").into_response());
    }
    Ok(render::page(&state, &csrf, "register", &json!({ "title": "Register" }))?.into_response())
}

/// Handle user registration
///
/// # Returns
/// * `AppResult<Response>` - Redirect to the login page, or the form again
///   with the validation messages
pub async fn handle_register(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    if current_user(&state, &jar).is_some() {
        return Ok(Redirect::to("/projects").into_response());
    }

    match register_user(&state.db, &form).await {
        Ok(_) => Ok(render::redirect_with_message(
            "/login",
            "Registration successful! You can now log in.",
        )
        .into_response()),
        Err(AppError::Validation(errors)) => {
            let page = render::page(
                &state,
                &csrf,
                "register",
                &json!({ "title": "Register", "errors": errors, "form_username": form.username }),
            )?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e),
    }
}

/// Serve the login page
pub async fn serve_login_page(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> AppResult<Response> {
    if current_user(&state, &jar).is_some() {
        return Ok(Redirect::to("/projects").into_response());
    }
    let page = login_page(&state, &csrf, &query, None, "")?;
    Ok(page.into_response())
}

fn login_page(
    state: &AppState,
    csrf: &CsrfToken,
    query: &LoginQuery,
    error: Option<&str>,
    username: &str,
) -> AppResult<Html<String>> {
    render::page(
        state,
        csrf,
        "login",
        &json!({
            "title": "Login",
            "next": safe_next(query.next.as_deref()).map(|n| urlencoding::encode(n).into_owned()),
            "message": query.flash.message,
            "error": error.map(str::to_string).or_else(|| query.flash.error.clone()),
            "form_username": username,
        }),
    )
}

/// Handle user login requests
///
/// Validates credentials and creates a session if valid.
///
/// # Returns
/// * `AppResult<Response>` - Redirect to `next` or the project list if
///   successful, or the login form again with a 401 status
pub async fn handle_login(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
    Form(credentials): Form<LoginForm>,
) -> AppResult<Response> {
    if current_user(&state, &jar).is_some() {
        return Ok(Redirect::to("/projects").into_response());
    }

    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        let page = login_page(&state, &csrf, &query, Some("Username and password are required."), &credentials.username)?;
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }

    match authenticate(&state.db, &credentials.username, &credentials.password).await? {
        Some(user) => {
            let session_id = state.sessions.create(CurrentUser::from(&user));
            log::info!("User {} logged in", user.username);

            let target = safe_next(query.next.as_deref()).unwrap_or("/projects");
            Ok((jar.add(session_cookie(session_id)), Redirect::to(target)).into_response())
        }
        None => {
            log::warn!("Failed login attempt for {}", credentials.username.trim());
            let page = login_page(&state, &csrf, &query, Some("Invalid username or password."), &credentials.username)?;
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
    }
}

/// Handle user logout
///
/// Drops the session and clears the session cookie.
pub async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        render::redirect_with_message("/", "You have been logged out."),
    )
}

/// Authentication middleware
///
/// Attaches the [`CurrentUser`] to the request when the session is valid.
/// Otherwise API and XHR calls get a 401 JSON body and page requests are
/// redirected to the login page. Only GET requests are remembered as the
/// post-login target, since the browser follows that redirect with a GET.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = current_user(&state, &jar) {
        request.extensions_mut().insert(user);
        return next.run(request).await;
    }

    if request.uri().path().starts_with("/api/") || is_ajax(request.headers()) {
        return AppError::Unauthorized.into_json();
    }

    if *request.method() != Method::GET {
        return Redirect::to("/login").into_response();
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&format!("/login?next={}", urlencoding::encode(target))).into_response()
}
