//! `rebuild`: reset followed by a full `up`

use crate::fixtures::{broken_up, standard_set, COMMENTS, USERS};
use crate::helpers::{applied_names, applied_versions, table_exists, TestDb};
use chronicle_migrations::{Direction, UpTarget};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_rebuild_from_empty_applies_everything() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;

    let report = runner.rebuild(false).await.unwrap();

    assert_eq!(report.reverted(), 0);
    assert_eq!(report.applied(), 3);
    assert_eq!(report.message(), "Rebuild complete.");
    assert_eq!(
        applied_names(&runner).await,
        vec!["create_users", "create_posts", "create_comments"]
    );
}

#[tokio::test]
async fn test_rebuild_reverts_then_reapplies() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;
    runner.up(UpTarget::Latest).await.unwrap();
    let before = applied_versions(&runner).await;

    let report = runner.rebuild(false).await.unwrap();

    let directions: Vec<_> = report.steps.iter().map(|s| s.direction).collect();
    assert_eq!(
        directions,
        vec![
            Direction::Down,
            Direction::Down,
            Direction::Down,
            Direction::Up,
            Direction::Up,
            Direction::Up,
        ]
    );
    assert_eq!(report.steps[0].name, COMMENTS.name);
    assert_eq!(report.steps[3].name, USERS.name);
    assert_eq!(applied_versions(&runner).await, before);
}

#[tokio::test]
async fn test_forced_rebuild_drops_unmanaged_tables() {
    let db = TestDb::new();
    db.write_fixture(&USERS);
    let runner = db.runner().await;
    runner.pool().execute("CREATE TABLE unmanaged (id INTEGER)").await.unwrap();

    let report = runner.rebuild(true).await.unwrap();

    assert_eq!(report.dropped_tables, vec!["unmanaged"]);
    assert!(!table_exists(&runner, "unmanaged").await);
    assert!(table_exists(&runner, USERS.table).await);
}

#[tokio::test]
async fn test_rebuild_halts_on_failing_migration() {
    let db = TestDb::new();
    db.write_fixtures(&[USERS, broken_up("20230116000000"), COMMENTS]);
    let runner = db.runner().await;

    let err = runner.rebuild(false).await.unwrap_err();

    assert!(err.is_halt());
    assert_eq!(applied_names(&runner).await, vec![USERS.name]);
    assert!(!table_exists(&runner, COMMENTS.table).await);
}
