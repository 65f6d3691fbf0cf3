//! Contracts shared between the SQL-specific connector crate and `dbterra-core`: the
//! `Connector` trait, the dialect `Capabilities` bitset, `MigrationPlan`, and the four-way
//! error taxonomy from spec.md §7.

mod capabilities;
mod errors;
mod plan;

pub use capabilities::{postgres_capabilities, sqlite_capabilities, Capabilities, Capability};
pub use errors::{DependencyError, MigrationError, ParserError, ValidationError};
pub use plan::{MigrationPlan, Statement};

use async_trait::async_trait;
use sql_schema_describer::SqlSchema;

/// Options threaded through `Connector::execute`, one field per `apply` CLI flag
/// (spec.md §6).
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub auto_approve: bool,
    pub dry_run: bool,
    pub lock_name: String,
    pub lock_timeout_seconds: u64,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        ExecuteOptions {
            auto_approve: false,
            dry_run: false,
            lock_name: "dbterra_migrate_execute".to_string(),
            lock_timeout_seconds: 10,
        }
    }
}

/// How far the concurrent tail got before a failure, so the error message can say which
/// statements outside the transaction already committed (spec.md §5, "Recovery").
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub transactional_applied: usize,
    pub concurrent_applied: usize,
}

/// One implementation per dialect (`dbterra-sql-connector::{PostgresConnector,
/// SqliteConnector}`). Bundles introspection, the capability record, and DDL execution
/// behind a single object `dbterra-core` can hold without knowing which dialect it picked.
#[async_trait]
pub trait Connector: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    async fn describe(&self, managed_schemas: &[String]) -> Result<SqlSchema, MigrationError>;

    /// Execute the plan per the 6-step protocol of spec.md §4.5. Returns as soon as the
    /// advisory lock has been released, whether that was after a clean run or a failure.
    async fn execute(&self, plan: &MigrationPlan, options: &ExecuteOptions) -> Result<ExecutionReport, MigrationError>;
}
