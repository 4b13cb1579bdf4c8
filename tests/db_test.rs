use chrono::NaiveDate;
use gantt_tracker::config::DeletePolicy;
use gantt_tracker::db::{self, Database, TaskOrder};
use gantt_tracker::error::AppError;
use gantt_tracker::forms::{ProjectInput, TaskInput};
use gantt_tracker::models::TaskStatus;
use tempfile::TempDir;

// Helper to open a fresh database in a temporary directory
async fn open_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let db = Database::connect(&url).await.expect("connect");
    db.init_schema().await.expect("schema");
    (dir, db)
}

async fn seed_user_and_project(db: &Database, username: &str) -> (i64, i64) {
    let mut tx = db.begin().await.unwrap();
    let user_id = db::insert_user(&mut tx, username, "$argon2id$fake").await.unwrap();
    let project = ProjectInput {
        name: format!("{}'s project", username),
        description: None,
    };
    let project_id = db::insert_project(&mut tx, user_id, &project).await.unwrap();
    tx.commit().await.unwrap();
    (user_id, project_id)
}

fn task_input(name: &str, start: Option<(i32, u32, u32)>) -> TaskInput {
    let date = start.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
    TaskInput {
        name: name.to_string(),
        start_date: date,
        end_date: date,
        progress: 10,
        status: TaskStatus::ToDo,
        dependencies: None,
        comment: None,
    }
}

#[tokio::test]
async fn tasks_round_trip_with_dates_and_order() {
    let (_dir, db) = open_db().await;
    let (user_id, project_id) = seed_user_and_project(&db, "alice").await;

    let mut tx = db.begin().await.unwrap();
    let late = db::insert_task(&mut tx, project_id, user_id, &task_input("Alpha", Some((2024, 5, 1)))).await.unwrap();
    let early = db::insert_task(&mut tx, project_id, user_id, &task_input("Beta", Some((2024, 1, 1)))).await.unwrap();
    tx.commit().await.unwrap();

    let by_name = db.tasks_for_project(project_id, TaskOrder::Name).await.unwrap();
    assert_eq!(by_name.iter().map(|t| t.id).collect::<Vec<_>>(), vec![late, early]);

    let by_start = db.tasks_for_project(project_id, TaskOrder::StartDate).await.unwrap();
    assert_eq!(by_start.iter().map(|t| t.id).collect::<Vec<_>>(), vec![early, late]);

    let stored = db.task(early).await.unwrap().unwrap();
    assert_eq!(stored.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    assert_eq!(stored.status, "To Do");
    assert_eq!(stored.progress, 10);
    assert_eq!(stored.user_id, user_id);
}

#[tokio::test]
async fn update_replaces_every_field() {
    let (_dir, db) = open_db().await;
    let (user_id, project_id) = seed_user_and_project(&db, "bob").await;

    let mut tx = db.begin().await.unwrap();
    let mut input = task_input("Draft", Some((2024, 1, 1)));
    input.dependencies = Some("Kickoff".to_string());
    input.comment = Some("first pass".to_string());
    let task_id = db::insert_task(&mut tx, project_id, user_id, &input).await.unwrap();
    tx.commit().await.unwrap();

    let replacement = TaskInput {
        name: "Final".to_string(),
        start_date: None,
        end_date: None,
        progress: 100,
        status: TaskStatus::Completed,
        dependencies: None,
        comment: None,
    };
    let mut tx = db.begin().await.unwrap();
    db::update_task(&mut tx, task_id, &replacement).await.unwrap();
    tx.commit().await.unwrap();

    let stored = db.task(task_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Final");
    assert_eq!(stored.start_date, None);
    assert_eq!(stored.progress, 100);
    assert_eq!(stored.status, "Completed");
    assert_eq!(stored.dependencies, None);
    assert_eq!(stored.comment, None);
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let (_dir, db) = open_db().await;
    let (user_id, project_id) = seed_user_and_project(&db, "carol").await;

    {
        let mut tx = db.begin().await.unwrap();
        db::insert_task(&mut tx, project_id, user_id, &task_input("Ghost", None)).await.unwrap();
        // no commit
    }

    let tasks = db.tasks_for_project(project_id, TaskOrder::Name).await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn cascade_delete_removes_tasks() {
    let (_dir, db) = open_db().await;
    let (user_id, project_id) = seed_user_and_project(&db, "dave").await;

    let mut tx = db.begin().await.unwrap();
    db::insert_task(&mut tx, project_id, user_id, &task_input("One", None)).await.unwrap();
    db::insert_task(&mut tx, project_id, user_id, &task_input("Two", None)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let removed = db::delete_project(&mut tx, project_id, DeletePolicy::Cascade).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(removed, 2);
    assert!(db.project(project_id).await.unwrap().is_none());
    assert!(db.tasks_for_project(project_id, TaskOrder::Name).await.unwrap().is_empty());
}

#[tokio::test]
async fn restrict_delete_refuses_non_empty_project() {
    let (_dir, db) = open_db().await;
    let (user_id, project_id) = seed_user_and_project(&db, "erin").await;

    let mut tx = db.begin().await.unwrap();
    db::insert_task(&mut tx, project_id, user_id, &task_input("Keep", None)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let result = db::delete_project(&mut tx, project_id, DeletePolicy::Restrict).await;
    drop(tx);

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(db.project(project_id).await.unwrap().is_some());
    assert_eq!(db.tasks_for_project(project_id, TaskOrder::Name).await.unwrap().len(), 1);
}

#[tokio::test]
async fn restrict_delete_allows_empty_project() {
    let (_dir, db) = open_db().await;
    let (_, project_id) = seed_user_and_project(&db, "frank").await;

    let mut tx = db.begin().await.unwrap();
    let removed = db::delete_project(&mut tx, project_id, DeletePolicy::Restrict).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(removed, 0);
    assert!(db.project(project_id).await.unwrap().is_none());
}

#[tokio::test]
async fn projects_are_scoped_to_their_owner() {
    let (_dir, db) = open_db().await;
    let (alice, alice_project) = seed_user_and_project(&db, "alice").await;
    let (bob, _) = seed_user_and_project(&db, "bob").await;

    assert!(db.project_for_user(alice_project, alice).await.unwrap().is_some());
    assert!(db.project_for_user(alice_project, bob).await.unwrap().is_none());
    assert_eq!(db.projects_for_user(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let (_dir, db) = open_db().await;
    seed_user_and_project(&db, "grace").await;

    let mut tx = db.begin().await.unwrap();
    let result = db::insert_user(&mut tx, "grace", "$argon2id$other").await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn comment_update_and_missing_task() {
    let (_dir, db) = open_db().await;
    let (user_id, project_id) = seed_user_and_project(&db, "heidi").await;

    let mut tx = db.begin().await.unwrap();
    let task_id = db::insert_task(&mut tx, project_id, user_id, &task_input("Note me", None)).await.unwrap();
    db::set_task_comment(&mut tx, task_id, "looks good").await.unwrap();
    let missing = db::set_task_comment(&mut tx, task_id + 100, "nobody").await;
    tx.commit().await.unwrap();

    assert!(matches!(missing, Err(AppError::NotFound)));
    let stored = db.task(task_id).await.unwrap().unwrap();
    assert_eq!(stored.comment.as_deref(), Some("looks good"));
}
