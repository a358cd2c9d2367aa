//! `reset` with and without dropping tables

use crate::fixtures::{standard_set, USERS};
use crate::helpers::{applied_versions, table_exists, TestDb};
use chronicle_migrations::{MigrationError, RunOutcome, SchemaAdmin, UpTarget};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_reset_reverts_everything() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    let runner = db.runner().await;
    runner.up(UpTarget::Latest).await.unwrap();
    runner.pool().execute("CREATE TABLE unmanaged (id INTEGER)").await.unwrap();

    let report = runner.reset(false).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.reverted(), 3);
    assert!(report.dropped_tables.is_empty());
    assert_eq!(report.message(), "Reset complete.");
    assert!(applied_versions(&runner).await.is_empty());
    assert!(table_exists(&runner, "unmanaged").await);
}

#[tokio::test]
async fn test_reset_with_nothing_installed() {
    let db = TestDb::new();
    let runner = db.runner().await;

    let report = runner.reset(false).await.unwrap();

    assert!(report.steps.is_empty());
    assert_eq!(report.last_version, 0);
}

#[tokio::test]
async fn test_forced_reset_drops_other_tables() {
    let db = TestDb::new();
    db.write_fixture(&USERS);
    let runner = db.runner().await;
    runner.up(UpTarget::Latest).await.unwrap();
    runner.pool().execute("CREATE TABLE unmanaged (id INTEGER)").await.unwrap();
    runner.pool().execute("CREATE TABLE leftovers (id INTEGER)").await.unwrap();

    let report = runner.reset(true).await.unwrap();

    assert_eq!(report.reverted(), 1);
    assert_eq!(report.dropped_tables, vec!["leftovers", "unmanaged"]);
    assert!(!table_exists(&runner, "unmanaged").await);
    assert!(!table_exists(&runner, "leftovers").await);

    let table = runner.config().table_name.clone();
    assert!(table_exists(&runner, &table).await);
    assert!(table_exists(&runner, &runner.config().lock_table_name()).await);
}

#[tokio::test]
async fn test_forced_reset_drops_linked_tables() {
    let db = TestDb::new();
    let runner = db.runner().await;
    runner
        .pool()
        .execute_script(
            "CREATE TABLE authors (id INTEGER PRIMARY KEY);
             CREATE TABLE books (id INTEGER PRIMARY KEY, author_id INTEGER NOT NULL REFERENCES authors(id));
             INSERT INTO authors (id) VALUES (1);
             INSERT INTO books (id, author_id) VALUES (1, 1);",
        )
        .await
        .unwrap();

    let report = runner.reset(true).await.unwrap();

    assert_eq!(report.dropped_tables, vec!["authors", "books"]);
    assert!(!table_exists(&runner, "authors").await);
    assert!(!table_exists(&runner, "books").await);
    assert!(runner.lock_holder().await.unwrap().is_none());
}

#[tokio::test]
async fn test_forced_reset_is_all_or_nothing() {
    let db = TestDb::new();
    let runner = db.runner().await;
    let pool = runner.pool();
    pool.execute_script(
        "CREATE TABLE alpha (id INTEGER PRIMARY KEY);
         CREATE TABLE bravo (id INTEGER PRIMARY KEY);
         CREATE TABLE charlie (id INTEGER PRIMARY KEY, bravo_id INTEGER NOT NULL REFERENCES bravo(id));
         INSERT INTO bravo (id) VALUES (1);
         INSERT INTO charlie (id, bravo_id) VALUES (1, 1);",
    )
    .await
    .unwrap();

    // Keeping charlie leaves its row pointing at a dropped bravo.
    let config = runner.config();
    let admin = SchemaAdmin::new(
        Arc::clone(pool),
        [
            config.table_name.clone(),
            config.lock_table_name(),
            "charlie".to_string(),
        ],
    );

    let err = admin.drop_all().await.unwrap_err();

    assert!(matches!(err, MigrationError::DropFailed { .. }), "{err:?}");
    for table in ["alpha", "bravo", "charlie"] {
        assert!(table_exists(&runner, table).await, "{table} was dropped");
    }
}
