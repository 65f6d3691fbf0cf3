//! End-to-end tests against the `dbterra` binary itself, exercised over a file-backed
//! SQLite database so they need no external server (spec.md §6, §8 "concrete scenarios").

use std::fs;
use std::process::Command;

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_dbterra")
}

fn run(args: &[&str]) -> std::process::Output {
    Command::new(bin_path()).args(args).output().expect("spawn dbterra")
}

fn write_schema(dir: &std::path::Path, sql: &str) -> std::path::PathBuf {
    let path = dir.join("schema.sql");
    fs::write(&path, sql).unwrap();
    path
}

#[test]
fn help_exits_zero() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("apply"));
}

#[test]
fn version_exits_zero() {
    let output = run(&["--version"]);
    assert!(output.status.success());
}

#[test]
fn missing_required_flags_is_usage_error() {
    let output = run(&["apply"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_schema_file_is_a_core_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");
    let output = run(&[
        "apply",
        "--file",
        "/nonexistent/schema.sql",
        "--url",
        &format!("sqlite://{}", db_path.display()),
        "--auto-approve",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Schema file not found"), "{stderr}");
}

#[test]
fn forbidden_alter_statement_is_rejected_with_a_hint() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");
    let schema = write_schema(dir.path(), "ALTER TABLE users ADD COLUMN name TEXT;");
    let output = run(&[
        "apply",
        "--file",
        schema.to_str().unwrap(),
        "--url",
        &format!("sqlite://{}", db_path.display()),
        "--auto-approve",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ALTER"), "{stderr}");
    assert!(stderr.contains("hint:"), "{stderr}");
}

#[test]
fn dry_run_against_an_empty_database_prints_a_plan_and_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");
    fs::File::create(&db_path).unwrap();
    let schema = write_schema(dir.path(), "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);");

    let output = run(&[
        "apply",
        "--file",
        schema.to_str().unwrap(),
        "--url",
        &format!("sqlite://{}", db_path.display()),
        "--dry-run",
    ]);

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CREATE TABLE"), "{stdout}");
}

#[test]
fn applying_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");
    fs::File::create(&db_path).unwrap();
    let schema = write_schema(
        dir.path(),
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);\nCREATE INDEX users_email_idx ON users (email);",
    );
    let url = format!("sqlite://{}", db_path.display());

    let first = run(&["apply", "--file", schema.to_str().unwrap(), "--url", &url, "--auto-approve"]);
    assert!(first.status.success(), "{:?}", first);

    let second = run(&["apply", "--file", schema.to_str().unwrap(), "--url", &url, "--dry-run"]);
    assert!(second.status.success(), "{:?}", second);
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("no changes"), "{stdout}");
}

#[test]
fn unrecognized_connection_string_scheme_is_a_core_error() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path(), "CREATE TABLE users (id INTEGER PRIMARY KEY);");
    let output = run(&[
        "apply",
        "--file",
        schema.to_str().unwrap(),
        "--url",
        "mysql://localhost/db",
        "--auto-approve",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dialect"), "{stderr}");
}
