//! Live introspection tests for the Postgres describer. These need a running server and
//! are skipped (not failed) when `DBTERRA_TEST_DATABASE_URL` isn't set, the same convention
//! `dbterra-tests`'s Postgres scenarios follow — CI sets it, a bare `cargo test` on a
//! laptop without Postgres installed doesn't explode.

use sql_schema_describer::postgres::PostgresDescriber;
use sql_schema_describer::{SchemaDescriber, ViewCheckOption};
use sqlx::PgPool;

async fn connect() -> Option<PgPool> {
    let url = std::env::var("DBTERRA_TEST_DATABASE_URL").ok()?;
    Some(PgPool::connect(&url).await.expect("connect to DBTERRA_TEST_DATABASE_URL"))
}

macro_rules! require_postgres {
    () => {
        match connect().await {
            Some(pool) => pool,
            None => {
                eprintln!("skipping: DBTERRA_TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}

async fn reset_schema(pool: &PgPool, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(&format!("CREATE SCHEMA \"{schema}\"")).execute(pool).await.unwrap();
}

#[tokio::test]
async fn columns_types_and_defaults_round_trip() {
    let pool = require_postgres!();
    reset_schema(&pool, "dbterra_test_columns").await;
    sqlx::query(
        r#"
        CREATE TABLE dbterra_test_columns.accounts (
            id serial PRIMARY KEY,
            email varchar(255) NOT NULL,
            balance numeric(10,2) NOT NULL DEFAULT 0,
            created_at timestamptz NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let describer = PostgresDescriber::new(pool);
    let schema = describer.describe(&["dbterra_test_columns".to_string()]).await.unwrap();
    let table = schema.table("dbterra_test_columns", "accounts").unwrap();

    let id = table.column("id").unwrap();
    assert!(id.primary);

    let balance = table.column("balance").unwrap();
    assert!(balance.tpe.full_data_type.contains("numeric"));
    assert_eq!(balance.default.as_ref().unwrap().0, "0");

    let created_at = table.column("created_at").unwrap();
    assert!(created_at.default.as_ref().unwrap().0.to_lowercase().contains("now"));
}

#[tokio::test]
async fn foreign_keys_to_unmanaged_schemas_are_flagged() {
    let pool = require_postgres!();
    reset_schema(&pool, "dbterra_test_fk_a").await;
    reset_schema(&pool, "dbterra_test_fk_b").await;
    sqlx::query("CREATE TABLE dbterra_test_fk_b.accounts (id serial PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE dbterra_test_fk_a.orders (id serial PRIMARY KEY, account_id integer REFERENCES dbterra_test_fk_b.accounts(id))",
    )
    .execute(&pool)
    .await
    .unwrap();

    let describer = PostgresDescriber::new(pool);
    let schema = describer.describe(&["dbterra_test_fk_a".to_string()]).await.unwrap();
    let table = schema.table("dbterra_test_fk_a", "orders").unwrap();
    let fk = table.foreign_keys.first().expect("foreign key must be captured");
    assert!(fk.references_unmanaged_table, "a reference into an unmanaged schema must be flagged opaque");
}

#[tokio::test]
async fn enum_values_are_returned_in_declaration_order() {
    let pool = require_postgres!();
    reset_schema(&pool, "dbterra_test_enums").await;
    sqlx::query("CREATE TYPE dbterra_test_enums.mood AS ENUM ('sad', 'ok', 'happy')")
        .execute(&pool)
        .await
        .unwrap();

    let describer = PostgresDescriber::new(pool);
    let schema = describer.describe(&["dbterra_test_enums".to_string()]).await.unwrap();
    let mood = schema.enum_type("dbterra_test_enums", "mood").unwrap();
    assert_eq!(mood.values, vec!["sad".to_string(), "ok".to_string(), "happy".to_string()]);
}

#[tokio::test]
async fn materialized_views_are_distinguished_from_plain_views() {
    let pool = require_postgres!();
    reset_schema(&pool, "dbterra_test_views").await;
    sqlx::query("CREATE TABLE dbterra_test_views.users (id serial PRIMARY KEY, active boolean NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE VIEW dbterra_test_views.active_users AS SELECT id FROM dbterra_test_views.users WHERE active")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE MATERIALIZED VIEW dbterra_test_views.user_counts AS SELECT count(*) FROM dbterra_test_views.users")
        .execute(&pool)
        .await
        .unwrap();

    let describer = PostgresDescriber::new(pool);
    let schema = describer.describe(&["dbterra_test_views".to_string()]).await.unwrap();

    let plain = schema.view("dbterra_test_views", "active_users").unwrap();
    assert!(!plain.materialized);
    assert_eq!(plain.check_option, ViewCheckOption::None);

    let materialized = schema.view("dbterra_test_views", "user_counts").unwrap();
    assert!(materialized.materialized);
}

#[tokio::test]
async fn unmanaged_schemas_are_never_returned() {
    let pool = require_postgres!();
    reset_schema(&pool, "dbterra_test_unmanaged").await;
    sqlx::query("CREATE TABLE dbterra_test_unmanaged.secrets (id serial PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();

    let describer = PostgresDescriber::new(pool);
    let schema = describer.describe(&["public".to_string()]).await.unwrap();
    assert!(schema.table("dbterra_test_unmanaged", "secrets").is_none());
}
