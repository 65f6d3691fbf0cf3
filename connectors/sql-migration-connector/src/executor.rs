//! Executor (C5). Implements the 6-step protocol from spec.md §4.5: dry-run short circuit,
//! destructive-statement confirmation, advisory lock, transactional phase, concurrent tail,
//! lock release.

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use migration_connector::{ExecuteOptions, ExecutionReport, MigrationError, MigrationPlan};
use sqlx::{PgPool, SqlitePool};

use crate::lock::{FileLock, PostgresAdvisoryLock};

pub async fn execute_postgres(pool: &PgPool, plan: &MigrationPlan, options: &ExecuteOptions) -> Result<ExecutionReport, MigrationError> {
    if options.dry_run {
        print_plan(plan);
        return Ok(ExecutionReport::default());
    }

    if !plan.has_changes() {
        return Ok(ExecutionReport::default());
    }

    if !confirm_if_destructive(plan, options)? {
        return Err(cancelled());
    }

    let timeout = Duration::from_secs(options.lock_timeout_seconds);
    let lock = PostgresAdvisoryLock::acquire(pool, &options.lock_name, timeout).await?;

    let result = run_postgres_statements(pool, plan).await;
    lock.release(pool).await;
    result
}

pub async fn execute_sqlite(
    pool: &SqlitePool,
    db_path: &Path,
    plan: &MigrationPlan,
    options: &ExecuteOptions,
) -> Result<ExecutionReport, MigrationError> {
    if options.dry_run {
        print_plan(plan);
        return Ok(ExecutionReport::default());
    }

    if !plan.has_changes() {
        return Ok(ExecutionReport::default());
    }

    if !confirm_if_destructive(plan, options)? {
        return Err(cancelled());
    }

    let timeout = Duration::from_secs(options.lock_timeout_seconds);
    let lock = FileLock::acquire(db_path, timeout).await?;

    let result = run_sqlite_statements(pool, plan).await;
    lock.release();
    result
}

async fn run_postgres_statements(pool: &PgPool, plan: &MigrationPlan) -> Result<ExecutionReport, MigrationError> {
    let mut report = ExecutionReport::default();

    let mut tx = pool.begin().await.map_err(|e| MigrationError::from_driver("BEGIN", e.into()))?;
    for statement in &plan.transactional {
        if let Err(error) = sqlx::query(&statement.sql).execute(&mut *tx).await {
            let _ = tx.rollback().await;
            return Err(map_postgres_error(&statement.sql, error));
        }
        report.transactional_applied += 1;
    }
    tx.commit().await.map_err(|e| MigrationError::from_driver("COMMIT", e.into()))?;

    for statement in &plan.concurrent {
        sqlx::query(&statement.sql).execute(pool).await.map_err(|e| map_postgres_error(&statement.sql, e))?;
        report.concurrent_applied += 1;
    }

    Ok(report)
}

async fn run_sqlite_statements(pool: &SqlitePool, plan: &MigrationPlan) -> Result<ExecutionReport, MigrationError> {
    let mut report = ExecutionReport::default();

    let mut tx = pool.begin().await.map_err(|e| MigrationError::from_driver("BEGIN", e.into()))?;
    for statement in &plan.transactional {
        if let Err(error) = sqlx::query(&statement.sql).execute(&mut *tx).await {
            let _ = tx.rollback().await;
            return Err(map_sqlite_error(&statement.sql, error));
        }
        report.transactional_applied += 1;
    }
    tx.commit().await.map_err(|e| MigrationError::from_driver("COMMIT", e.into()))?;

    // SQLite has no `CONCURRENTLY`; `Capabilities::ConcurrentIndex` is unset so the differ
    // never populates `plan.concurrent` for this dialect, but honor it anyway if it did.
    for statement in &plan.concurrent {
        sqlx::query(&statement.sql).execute(pool).await.map_err(|e| map_sqlite_error(&statement.sql, e))?;
        report.concurrent_applied += 1;
    }

    Ok(report)
}

fn confirm_if_destructive(plan: &MigrationPlan, options: &ExecuteOptions) -> Result<bool, MigrationError> {
    if options.auto_approve || !plan.has_destructive_statements() {
        return Ok(true);
    }

    print!("This migration includes destructive statements. Apply anyway? [y/N] ");
    std::io::stdout().flush().ok();

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|e| MigrationError::from_driver("read confirmation", anyhow::Error::new(e)))?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn cancelled() -> MigrationError {
    MigrationError {
        statement: String::new(),
        code: None,
        detail: Some("migration cancelled by user".to_string()),
        hint: None,
        position: None,
        source: None,
    }
}

fn print_plan(plan: &MigrationPlan) {
    println!("-- transactional");
    for statement in &plan.transactional {
        println!("{};", statement.sql);
    }
    if !plan.concurrent.is_empty() {
        println!("-- concurrent");
        for statement in &plan.concurrent {
            println!("{};", statement.sql);
        }
    }
    if !plan.has_changes() {
        println!("-- no changes");
    }
}

fn map_postgres_error(statement: &str, error: sqlx::Error) -> MigrationError {
    if let sqlx::Error::Database(db_err) = &error {
        if let Some(pg_err) = db_err.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
            return MigrationError {
                statement: statement.to_string(),
                code: Some(pg_err.code().to_string()),
                detail: pg_err.detail().map(str::to_string),
                hint: pg_err.hint().map(str::to_string),
                position: None,
                source: Some(anyhow::Error::new(error)),
            };
        }
    }
    MigrationError::from_driver(statement, error.into())
}

fn map_sqlite_error(statement: &str, error: sqlx::Error) -> MigrationError {
    if let sqlx::Error::Database(db_err) = &error {
        return MigrationError {
            statement: statement.to_string(),
            code: db_err.code().map(|c| c.to_string()),
            detail: Some(db_err.message().to_string()),
            hint: None,
            position: None,
            source: Some(anyhow::Error::new(error)),
        };
    }
    MigrationError::from_driver(statement, error.into())
}
