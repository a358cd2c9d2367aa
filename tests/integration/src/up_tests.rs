//! `up` behavior: target windows, idempotence and halting

use crate::fixtures::{broken_up, standard_set, COMMENTS, POSTS, USERS};
use crate::helpers::{applied_names, applied_versions, table_exists, version, TestDb};
use crate::mock_scripts::{CallLog, FailOn, FailingScript, RecordingScript};
use chronicle_migrations::{
    MigrationError, MigrationRegistry, MigrationState, RunOutcome, UpTarget,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_up_applies_all_in_order() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;

    let report = runner.up(UpTarget::Latest).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.applied(), 3);
    assert_eq!(
        report.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["create_users", "create_posts", "create_comments"]
    );
    assert_eq!(report.last_version, version(COMMENTS.stamp));
    for fixture in standard_set() {
        assert!(table_exists(&runner, fixture.table).await);
    }
}

#[tokio::test]
async fn test_up_is_idempotent() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;

    runner.up(UpTarget::Latest).await.unwrap();
    let second = runner.up(UpTarget::Latest).await.unwrap();

    assert_eq!(second.outcome, RunOutcome::NothingToDo);
    assert!(second.steps.is_empty());
    assert_eq!(second.message(), "All updated.");
    assert_eq!(applied_versions(&runner).await.len(), 3);
}

#[tokio::test]
async fn test_up_until_date_is_inclusive() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;

    let report = runner
        .up(UpTarget::parse(Some(POSTS.stamp)).unwrap())
        .await
        .unwrap();

    assert_eq!(report.applied(), 2);
    assert_eq!(
        applied_versions(&runner).await,
        vec![version(USERS.stamp), version(POSTS.stamp)]
    );
    assert!(!table_exists(&runner, COMMENTS.table).await);

    let rest = runner.up(UpTarget::Latest).await.unwrap();
    assert_eq!(rest.applied(), 1);
    assert_eq!(rest.steps[0].name, COMMENTS.name);
}

#[tokio::test]
async fn test_up_ignores_future_files() {
    let db = TestDb::new();
    db.write_fixture(&USERS);
    db.write_migration(
        "29991231235959",
        "from_the_future",
        "CREATE TABLE future (id INTEGER);",
        "DROP TABLE future;",
    );
    let runner = db.runner().await;

    let report = runner.up(UpTarget::Latest).await.unwrap();

    assert_eq!(report.applied(), 1);
    assert!(!table_exists(&runner, "future").await);
}

#[tokio::test]
async fn test_up_skips_files_older_than_last_version() {
    let db = TestDb::new();
    db.write_fixtures(&[USERS, COMMENTS]);
    let runner = db.runner().await;
    runner.up(UpTarget::Latest).await.unwrap();

    // Lands between two applied versions.
    db.write_fixture(&POSTS);
    let report = runner.up(UpTarget::Latest).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::NothingToDo);
    assert!(!table_exists(&runner, POSTS.table).await);

    let status = runner.status().await.unwrap();
    let skipped: Vec<_> = status
        .with_state(MigrationState::Skipped)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(skipped, vec![POSTS.name]);
}

#[tokio::test]
async fn test_up_halts_on_failure_and_keeps_prior_steps() {
    let db = TestDb::new();
    db.write_fixtures(&[USERS, broken_up("20230116000000"), COMMENTS]);
    let runner = db.runner().await;

    let err = runner.up(UpTarget::Latest).await.unwrap_err();

    match err {
        MigrationError::Execution { version: v, name, .. } => {
            assert_eq!(v, version("20230116000000"));
            assert_eq!(name, "broken_up");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
    assert!(runner.lock_holder().await.unwrap().is_none());
    assert_eq!(applied_names(&runner).await, vec![USERS.name]);
    // The broken script ran inside one transaction.
    assert!(!table_exists(&runner, "broken").await);
    assert!(!table_exists(&runner, COMMENTS.table).await);
}

#[tokio::test]
async fn test_up_uses_registered_scripts() {
    let db = TestDb::new();
    db.write_migration("20230101000000", "seed", "SELECT 1;", "SELECT 1;");
    db.write_fixture(&USERS);
    let log = CallLog::new();
    let registry = MigrationRegistry::new().with("seed", RecordingScript::new("seed", &log));
    let runner = db.runner_with(registry).await;

    let report = runner.up(UpTarget::Latest).await.unwrap();

    assert_eq!(report.applied(), 2);
    assert_eq!(log.calls(), vec!["up:seed"]);
    assert!(table_exists(&runner, USERS.table).await);
}

#[tokio::test]
async fn test_up_registered_script_failure_halts() {
    let db = TestDb::new();
    let log = CallLog::new();
    let registry =
        MigrationRegistry::new().with("failing", FailingScript::new(FailOn::Apply, &log));
    db.write_migration("20230101000000", "failing", "SELECT 1;", "SELECT 1;");
    let runner = db.runner_with(registry).await;

    let err = runner.up(UpTarget::Latest).await.unwrap_err();

    assert!(err.is_halt());
    assert!(err.to_string().contains("scripted apply failure"));
    assert_eq!(log.calls(), vec!["up:failing"]);
    assert!(applied_versions(&runner).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_versions_abort_before_any_step() {
    let db = TestDb::new();
    db.write_fixture(&USERS);
    db.write_migration(USERS.stamp, "also_users", "CREATE TABLE twin (id INTEGER);", "DROP TABLE twin;");
    let runner = db.runner().await;

    let err = runner.up(UpTarget::Latest).await.unwrap_err();

    assert!(matches!(err, MigrationError::DuplicateFile { .. }));
    assert!(applied_versions(&runner).await.is_empty());
    assert!(!table_exists(&runner, USERS.table).await);
}

#[tokio::test]
async fn test_plan_up_does_not_touch_the_database() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;

    let plan = runner.plan_up(UpTarget::Latest).await.unwrap();

    assert_eq!(plan.len(), 3);
    assert_eq!(plan[0].name, USERS.name);
    assert!(applied_versions(&runner).await.is_empty());
    assert!(!table_exists(&runner, USERS.table).await);
}

#[tokio::test]
async fn test_up_applies_backfill_with_semicolon_in_literal() {
    let db = TestDb::new();
    db.write_migration(
        "20230115120000",
        "seed_notes",
        "CREATE TABLE notes (body TEXT);\nINSERT INTO notes (body) VALUES ('first; second');",
        "DROP TABLE notes;",
    );
    let runner = db.runner().await;

    let report = runner.up(UpTarget::Latest).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(applied_names(&runner).await, vec!["seed_notes"]);
    assert!(table_exists(&runner, "notes").await);
}
