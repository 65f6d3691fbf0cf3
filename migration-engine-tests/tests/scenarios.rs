//! The concrete scenarios catalogued in the spec: parse a desired state, diff it against a
//! current state parsed the same way, and check the resulting plan's shape.

use indoc::indoc;
use migration_connector::{postgres_capabilities, sqlite_capabilities, Capabilities};
use sql_migration_connector::diff;
use sql_parser::{parse, SqlDialectKind};
use sql_schema_describer::SqlSchema;

fn postgres_schema(sql: &str) -> SqlSchema {
    parse(sql, SqlDialectKind::Postgres).expect("valid desired-state SQL")
}

fn sqlite_schema(sql: &str) -> SqlSchema {
    parse(sql, SqlDialectKind::Sqlite).expect("valid desired-state SQL")
}

fn plan_sql(capabilities: Capabilities, desired: &str, current: &str) -> Vec<String> {
    let desired = postgres_schema(desired);
    let current = postgres_schema(current);
    let plan = diff(&desired, &current, capabilities).expect("diff must succeed");
    plan.transactional.iter().chain(&plan.concurrent).map(|s| s.sql.clone()).collect()
}

#[test]
fn s1_empty_to_single_table_emits_create_table() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE users (
                id SERIAL PRIMARY KEY,
                email VARCHAR(255) NOT NULL
            );
        "#},
        "",
    );

    assert!(statements.iter().any(|s| s.starts_with(r#"CREATE TABLE "public"."users""#)));
    assert!(statements.iter().any(|s| s.contains("\"email\"")));
}

#[test]
fn s2_adding_a_column_emits_add_column() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100), email VARCHAR(255));
        "#},
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100));
        "#},
    );

    assert!(statements
        .iter()
        .any(|s| s.contains(r#"ADD COLUMN "email""#) && s.to_lowercase().contains("character varying")));
}

#[test]
fn s3_column_replacement_adds_before_it_drops() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY, full_name VARCHAR(200));
        "#},
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100));
        "#},
    );

    let add_index = statements.iter().position(|s| s.contains(r#"ADD COLUMN "full_name""#));
    let drop_index = statements.iter().position(|s| s.contains(r#"DROP COLUMN "name""#));

    assert!(add_index.is_some(), "expected an ADD COLUMN statement, got {statements:?}");
    assert!(drop_index.is_some(), "expected a DROP COLUMN statement, got {statements:?}");
    assert!(add_index < drop_index, "ADD COLUMN must precede DROP COLUMN");
}

#[test]
fn s4_type_and_default_change_follows_the_micro_ordering() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE accounts (
                balance DECIMAL(10,2) NOT NULL DEFAULT 100.00
            );
        "#},
        indoc! {r#"
            CREATE TABLE accounts (
                balance VARCHAR(50) DEFAULT '0.00'
            );
        "#},
    );

    let positions = |needle: &str| statements.iter().position(|s| s.contains(needle));
    let drop_default = positions("DROP DEFAULT");
    let alter_type = positions("ALTER COLUMN \"balance\" TYPE");
    let set_default = positions("SET DEFAULT");
    let set_not_null = positions("SET NOT NULL");

    assert!(drop_default.is_some() && alter_type.is_some() && set_default.is_some() && set_not_null.is_some());
    assert!(drop_default < alter_type);
    assert!(alter_type < set_default);
    assert!(set_default < set_not_null);
}

#[test]
fn s5_reserved_keyword_column_round_trips_without_changes() {
    let sql = indoc! {r#"
        CREATE TABLE users ("year" INTEGER);
    "#};
    let schema = postgres_schema(sql);
    let plan = diff(&schema, &schema, postgres_capabilities()).unwrap();
    assert!(!plan.has_changes());
}

#[test]
fn s6_removing_a_dependent_table_is_destructive() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY);
        "#},
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY);
            CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));
        "#},
    );

    assert!(statements.iter().any(|s| s.starts_with(r#"DROP TABLE "public"."posts""#) && s.contains("CASCADE")));

    let desired = postgres_schema(indoc! {r#"CREATE TABLE users (id INTEGER PRIMARY KEY);"#});
    let current = postgres_schema(indoc! {r#"
        CREATE TABLE users (id INTEGER PRIMARY KEY);
        CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));
    "#});
    let plan = diff(&desired, &current, postgres_capabilities()).unwrap();
    assert!(plan.has_destructive_statements());
}

#[test]
fn sqlite_column_type_change_rebuilds_the_table_instead_of_altering_in_place() {
    let desired = sqlite_schema(indoc! {r#"
        CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance TEXT NOT NULL);
    "#});
    let current = sqlite_schema(indoc! {r#"
        CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance INTEGER NOT NULL);
    "#});

    let plan = diff(&desired, &current, sqlite_capabilities()).expect("diff must succeed");
    let statements: Vec<String> = plan.transactional.iter().chain(&plan.concurrent).map(|s| s.sql.clone()).collect();

    assert!(!statements.iter().any(|s| s.contains("ALTER COLUMN")), "sqlite cannot ALTER COLUMN: {statements:?}");

    let create = statements.iter().position(|s| s.starts_with(r#"CREATE TABLE "main"."accounts__dbterra_new""#));
    let copy = statements.iter().position(|s| s.starts_with("INSERT INTO"));
    let drop = statements.iter().position(|s| s.starts_with(r#"DROP TABLE "main"."accounts""#));
    let rename = statements.iter().position(|s| s.contains("RENAME TO"));

    assert!(create.is_some() && copy.is_some() && drop.is_some() && rename.is_some(), "{statements:?}");
    assert!(create < copy && copy < drop && drop < rename);
}

#[test]
fn identical_snapshots_produce_no_changes() {
    let sql = indoc! {r#"
        CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100));
        CREATE INDEX users_name_idx ON users (name);
    "#};
    let schema = postgres_schema(sql);
    let plan = diff(&schema, &schema, postgres_capabilities()).unwrap();
    assert!(!plan.has_changes());
}

/// A freshly applied `SERIAL` column reads back from Postgres with an owned-sequence default
/// (`nextval('users_id_seq'::regclass)`) that the desired-state file never wrote. Re-diffing
/// against that live shape must still report no changes (spec.md §8 idempotence property).
#[test]
fn serial_column_is_idempotent_against_its_own_introspected_default() {
    let desired = postgres_schema(indoc! {r#"
        CREATE TABLE users (id SERIAL PRIMARY KEY, email VARCHAR(255) NOT NULL);
    "#});

    let mut current = desired.clone();
    {
        let table = current.tables.iter_mut().find(|t| t.name == "users").unwrap();
        let id = table.columns.iter_mut().find(|c| c.name == "id").unwrap();
        id.default = Some(sql_schema_describer::DefaultValue::new("nextval('users_id_seq'::regclass)"));
    }

    let plan = diff(&desired, &current, postgres_capabilities()).unwrap();
    assert!(!plan.has_changes(), "unexpected plan: {plan:?}");
}

/// An ordinary (acyclic) foreign key on a brand-new table is emitted inline by `CREATE TABLE`;
/// phase 8 must not also add it as a separate `ALTER TABLE ... ADD CONSTRAINT`.
#[test]
fn new_table_foreign_key_is_not_duplicated() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE users (id INTEGER PRIMARY KEY);
            CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));
        "#},
        "",
    );

    let fk_mentions = statements.iter().filter(|s| s.contains("FOREIGN KEY") || s.contains("REFERENCES")).count();
    assert_eq!(fk_mentions, 1, "expected exactly one foreign-key clause, got {statements:?}");
    assert!(!statements.iter().any(|s| s.starts_with(r#"ALTER TABLE "public"."posts" ADD"#) && s.contains("FOREIGN KEY")));
}

/// A view reading from a table whose column type is about to change must be dropped before
/// the `ALTER COLUMN ... TYPE` (Postgres refuses it otherwise) and recreated afterward, even
/// though the view's own definition never changed.
#[test]
fn view_over_an_altered_table_is_dropped_and_recreated() {
    let statements = plan_sql(
        postgres_capabilities(),
        indoc! {r#"
            CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance NUMERIC(10,2) NOT NULL);
            CREATE VIEW account_balances AS SELECT id, balance FROM accounts;
        "#},
        indoc! {r#"
            CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance VARCHAR(50) NOT NULL);
            CREATE VIEW account_balances AS SELECT id, balance FROM accounts;
        "#},
    );

    let drop_view = statements.iter().position(|s| s.starts_with(r#"DROP VIEW IF EXISTS "public"."account_balances""#));
    let alter_type = statements.iter().position(|s| s.contains(r#"ALTER COLUMN "balance" TYPE"#));
    let create_view = statements.iter().position(|s| s.starts_with(r#"CREATE VIEW "public"."account_balances""#));

    assert!(drop_view.is_some() && alter_type.is_some() && create_view.is_some(), "{statements:?}");
    assert!(drop_view < alter_type, "view must be dropped before the column type changes");
    assert!(alter_type < create_view, "view must be recreated after the column type changes");
}
