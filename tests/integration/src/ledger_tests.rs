//! Ledger creation, validation and repair

use crate::fixtures::{standard_set, USERS};
use crate::helpers::{applied_versions, version, TestDb};
use chronicle_migrations::{
    LedgerRepair, LedgerState, MigrationError, MigrationRegistry, MigrationRunner, UpTarget,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_ledger_created_then_valid() {
    let db = TestDb::new();

    let first = db.runner().await;
    assert_eq!(first.ledger_state(), LedgerState::Created);

    let second = db.runner().await;
    assert_eq!(second.ledger_state(), LedgerState::Valid);
}

#[tokio::test]
async fn test_ledger_survives_across_runners() {
    let db = TestDb::new();
    db.write_fixtures(&standard_set());
    db.runner().await.up(UpTarget::Latest).await.unwrap();

    let runner = db.runner().await;

    assert_eq!(runner.last_version().await.unwrap(), version("20230117120000"));
    assert_eq!(applied_versions(&runner).await.len(), 3);
}

#[tokio::test]
async fn test_mismatched_ledger_fails_by_default() {
    let db = TestDb::new();
    let pool = db.pool().await;
    pool.execute("CREATE TABLE schema_migrations (id INTEGER PRIMARY KEY, checksum TEXT)")
        .await
        .unwrap();

    let err = MigrationRunner::connect(db.config(), MigrationRegistry::new())
        .await
        .unwrap_err();

    match err {
        MigrationError::SchemaMismatch { table, found, .. } => {
            assert_eq!(table, "schema_migrations");
            assert!(found.contains("checksum"));
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
    assert!(pool.table_exists("schema_migrations").await.unwrap());
}

#[tokio::test]
async fn test_mismatched_ledger_recreated_on_request() {
    let db = TestDb::new();
    db.write_fixture(&USERS);
    let pool = db.pool().await;
    pool.execute("CREATE TABLE schema_migrations (version TEXT)").await.unwrap();
    pool.execute("INSERT INTO schema_migrations (version) VALUES ('stale')")
        .await
        .unwrap();

    let config = db
        .config_builder()
        .ledger_repair(LedgerRepair::Recreate)
        .build()
        .unwrap();
    let runner = MigrationRunner::connect(config, MigrationRegistry::new())
        .await
        .unwrap();

    assert_eq!(runner.ledger_state(), LedgerState::Recreated);
    assert!(applied_versions(&runner).await.is_empty());

    let report = runner.up(UpTarget::Latest).await.unwrap();
    assert_eq!(report.applied(), 1);
}

#[tokio::test]
async fn test_custom_ledger_table_name() {
    let db = TestDb::new();
    db.write_fixture(&USERS);
    let config = db.config_builder().table_name("app_versions").build().unwrap();
    let runner = MigrationRunner::connect(config, MigrationRegistry::new())
        .await
        .unwrap();

    runner.up(UpTarget::Latest).await.unwrap();

    let pool = runner.pool();
    assert!(pool.table_exists("app_versions").await.unwrap());
    assert!(pool.table_exists("app_versions_lock").await.unwrap());
    assert!(!pool.table_exists("schema_migrations").await.unwrap());
}

#[tokio::test]
async fn test_duplicate_version_rejected_by_store() {
    let db = TestDb::new();
    let runner = db.runner().await;
    let v = version(USERS.stamp);

    runner.store().append(v, USERS.name, 0).await.unwrap();
    let err = runner.store().append(v, USERS.name, 0).await.unwrap_err();

    assert!(matches!(err, MigrationError::DuplicateVersion { version } if version == v));
    assert!(runner.store().contains(v).await.unwrap());
}

#[tokio::test]
async fn test_remove_unknown_record() {
    let db = TestDb::new();
    let runner = db.runner().await;

    let err = runner.store().remove(42).await.unwrap_err();

    assert!(matches!(err, MigrationError::RecordNotFound { id: 42 }));
}
