//! Idempotence against a real (file-backed) SQLite database: no external server needed, so
//! unlike the Postgres tests in `postgres_live.rs` these always run.

use std::time::Duration;

use migration_connector::{Connector, ExecuteOptions};
use sql_migration_connector::{diff, SqliteConnector};
use sql_parser::{parse, SqlDialectKind};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::tempdir;

async fn connector_for(db_path: &std::path::Path) -> SqliteConnector {
    let options = SqliteConnectOptions::new().filename(db_path).create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await.expect("open sqlite database");
    SqliteConnector::new(pool, db_path)
}

#[tokio::test]
async fn applying_the_plan_twice_produces_no_further_changes() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("schema.db");
    let connector = connector_for(&db_path).await;

    let desired = parse(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT
        );
        CREATE INDEX users_email_idx ON users (email);
        "#,
        SqlDialectKind::Sqlite,
    )
    .unwrap();

    let empty = connector.describe(&["main".to_string()]).await.unwrap();
    let first_plan = diff(&desired, &empty, connector.capabilities()).unwrap();
    assert!(first_plan.has_changes());

    let options = ExecuteOptions {
        auto_approve: true,
        dry_run: false,
        lock_name: "dbterra_migrate_execute_test".to_string(),
        lock_timeout_seconds: 5,
    };
    connector.execute(&first_plan, &options).await.unwrap();

    let current = connector.describe(&["main".to_string()]).await.unwrap();
    let second_plan = diff(&desired, &current, connector.capabilities()).unwrap();
    assert!(!second_plan.has_changes(), "re-diffing against the applied state must report no changes");
}

#[tokio::test]
async fn dry_run_never_touches_the_database() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("schema.db");
    let connector = connector_for(&db_path).await;

    let desired = parse("CREATE TABLE users (id INTEGER PRIMARY KEY);", SqlDialectKind::Sqlite).unwrap();
    let empty = connector.describe(&["main".to_string()]).await.unwrap();
    let plan = diff(&desired, &empty, connector.capabilities()).unwrap();

    let options = ExecuteOptions {
        auto_approve: true,
        dry_run: true,
        lock_name: "dbterra_migrate_execute_test".to_string(),
        lock_timeout_seconds: 5,
    };
    connector.execute(&plan, &options).await.unwrap();

    let current = connector.describe(&["main".to_string()]).await.unwrap();
    assert!(current.tables.is_empty(), "dry-run must not create the table");
}

#[tokio::test]
async fn timeout_is_bounded_by_lock_timeout_seconds() {
    let start = tokio::time::Instant::now();
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("schema.db");
    let connector = connector_for(&db_path).await;

    let desired = parse("CREATE TABLE users (id INTEGER PRIMARY KEY);", SqlDialectKind::Sqlite).unwrap();
    let empty = connector.describe(&["main".to_string()]).await.unwrap();
    let plan = diff(&desired, &empty, connector.capabilities()).unwrap();
    let options = ExecuteOptions {
        auto_approve: true,
        dry_run: false,
        lock_name: "dbterra_migrate_execute_test".to_string(),
        lock_timeout_seconds: 5,
    };
    connector.execute(&plan, &options).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(5), "a successful run should not wait out the full lock timeout");
}
