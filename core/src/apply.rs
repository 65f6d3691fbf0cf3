//! Wires the four components together: parse the desired-state file, introspect the live
//! database, diff the two snapshots, and execute the resulting plan (spec.md §5).

use std::path::Path;

use migration_connector::{Connector, ExecuteOptions, ExecutionReport};
use sql_migration_connector::{diff, PostgresConnector, SqliteConnector};
use sql_parser::SqlDialectKind;
use sqlx::{PgPool, SqlitePool};

use crate::dialect::{self, Dialect};
use crate::error::CoreError;

/// Everything `apply` needs beyond the file path and connection string: the schemas to
/// manage and the flags that shape execution (spec.md §6).
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub managed_schemas: Vec<String>,
    pub execute: ExecuteOptions,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        ApplyOptions { managed_schemas: vec!["public".to_string()], execute: ExecuteOptions::default() }
    }
}

pub async fn apply(file: &Path, database_url: &str, options: &ApplyOptions) -> Result<ExecutionReport, CoreError> {
    let dialect = dialect::from_connection_string(database_url)
        .ok_or_else(|| CoreError::UnknownDialect(database_url.to_string()))?;

    let parser_dialect = match dialect {
        Dialect::Postgres => SqlDialectKind::Postgres,
        Dialect::Sqlite => SqlDialectKind::Sqlite,
    };
    let desired = sql_parser::parse_file(file, parser_dialect)?;

    let connector: Box<dyn Connector> = match dialect {
        Dialect::Postgres => {
            let pool = PgPool::connect(database_url)
                .await
                .map_err(|e| CoreError::Connection(anyhow::Error::new(e)))?;
            Box::new(PostgresConnector::new(pool))
        }
        Dialect::Sqlite => {
            let pool = SqlitePool::connect(database_url)
                .await
                .map_err(|e| CoreError::Connection(anyhow::Error::new(e)))?;
            Box::new(SqliteConnector::new(pool, dialect::sqlite_file_path(database_url)))
        }
    };

    let current = connector.describe(&options.managed_schemas).await?;
    let plan = diff(&desired, &current, connector.capabilities())?;
    let report = connector.execute(&plan, &options.execute).await?;
    Ok(report)
}
