use gantt_tracker::db::Database;
use gantt_tracker::error::AppError;
use gantt_tracker::login::{
    CurrentUser, RegisterForm, SessionStore, authenticate, hash_password, register_user,
    safe_next, validate_registration, verify_password,
};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

async fn open_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("login.db").display());
    let db = Database::connect(&url).await.expect("connect");
    db.init_schema().await.expect("schema");
    (dir, db)
}

fn form(username: &str, password: &str, confirm: &str) -> RegisterForm {
    RegisterForm {
        username: username.to_string(),
        password: password.to_string(),
        confirm_password: confirm.to_string(),
    }
}

fn someone() -> CurrentUser {
    CurrentUser {
        id: 1,
        username: "someone".to_string(),
    }
}

#[test]
fn password_hash_verifies_only_its_password() {
    let hash = hash_password("correct horse").unwrap();

    assert_ne!(hash, "correct horse");
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("correct horse", &hash).unwrap());
    assert!(!verify_password("wrong horse", &hash).unwrap());
}

#[test]
fn same_password_hashes_differently() {
    let first = hash_password("secret123").unwrap();
    let second = hash_password("secret123").unwrap();
    assert_ne!(first, second);
}

#[test]
fn malformed_hash_is_an_error() {
    assert!(matches!(
        verify_password("anything", "not-a-hash"),
        Err(AppError::PasswordHash(_))
    ));
}

#[test]
fn session_lifecycle() {
    let store = SessionStore::new(Duration::from_secs(60));
    let id = store.create(someone());

    assert_eq!(store.validate(&id), Some(someone()));
    assert_eq!(store.validate("not-a-session"), None);

    store.remove(&id);
    assert_eq!(store.validate(&id), None);
}

#[test]
fn each_session_gets_its_own_csrf_token() {
    let store = SessionStore::new(Duration::from_secs(60));
    let first = store.create(someone());
    let second = store.create(someone());

    let token = store.csrf_token(&first).unwrap();
    assert_eq!(token.len(), 32);
    assert_eq!(store.csrf_token(&first), Some(token.clone()));
    assert_ne!(store.csrf_token(&second), Some(token));

    store.remove(&first);
    assert_eq!(store.csrf_token(&first), None);
}

#[test]
fn next_target_must_be_a_plain_local_path() {
    assert_eq!(safe_next(Some("/projects/3")), Some("/projects/3"));
    assert_eq!(safe_next(Some("/projects?message=hi")), Some("/projects?message=hi"));

    for unsafe_target in [
        "//evil.example",
        "https://evil.example",
        "/\\evil.example",
        "/\t/evil.example",
        "/\n/evil.example",
        "/\r\nLocation: x",
        "/\u{0}x",
        "/\u{7f}x",
        "projects",
        "",
    ] {
        assert_eq!(safe_next(Some(unsafe_target)), None, "{:?}", unsafe_target);
    }
    assert_eq!(safe_next(None), None);
}

#[test]
fn expired_session_is_rejected() {
    let store = SessionStore::new(Duration::from_millis(10));
    let id = store.create(someone());
    sleep(Duration::from_millis(30));

    assert_eq!(store.validate(&id), None);
}

#[test]
fn registration_rules() {
    assert!(validate_registration(&form("alice", "secret1", "secret1")).is_ok());

    let short = validate_registration(&form("al", "secret1", "secret1")).unwrap_err();
    assert_eq!(short, vec!["Username must be between 3 and 20 characters long.".to_string()]);

    let long = validate_registration(&form(&"x".repeat(21), "secret1", "secret1")).unwrap_err();
    assert_eq!(long.len(), 1);

    let weak = validate_registration(&form("alice", "12345", "12345")).unwrap_err();
    assert_eq!(weak, vec!["Password must be at least 6 characters long.".to_string()]);

    let mismatch = validate_registration(&form("alice", "secret1", "secret2")).unwrap_err();
    assert_eq!(mismatch, vec!["Passwords must match.".to_string()]);

    let empty = validate_registration(&form("", "", "")).unwrap_err();
    assert!(empty.contains(&"Username is required.".to_string()));
    assert!(empty.contains(&"Password is required.".to_string()));
}

#[tokio::test]
async fn register_then_authenticate() {
    let (_dir, db) = open_db().await;

    let user_id = register_user(&db, &form("ivan", "hunter22", "hunter22")).await.unwrap();

    let stored = db.find_user(user_id).await.unwrap().unwrap();
    assert_eq!(stored.username, "ivan");
    assert_ne!(stored.password_hash, "hunter22");

    let ok = authenticate(&db, "ivan", "hunter22").await.unwrap();
    assert_eq!(ok.map(|u| u.id), Some(user_id));
    assert!(authenticate(&db, "ivan", "wrong-pass").await.unwrap().is_none());
    assert!(authenticate(&db, "nobody", "hunter22").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_registration_is_a_validation_error() {
    let (_dir, db) = open_db().await;
    register_user(&db, &form("judy", "hunter22", "hunter22")).await.unwrap();

    let result = register_user(&db, &form("judy", "another1", "another1")).await;
    match result {
        Err(AppError::Validation(errors)) => {
            assert_eq!(errors, vec!["Username already exists. Please choose a different one.".to_string()]);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}
