use std::path::{Path, PathBuf};

use async_trait::async_trait;
use migration_connector::{
    sqlite_capabilities, Capabilities, Connector, ExecuteOptions, ExecutionReport, MigrationError, MigrationPlan,
};
use sql_schema_describer::{sqlite::SqliteDescriber, SchemaDescriber, SqlSchema};
use sqlx::SqlitePool;

use crate::executor;

pub struct SqliteConnector {
    pool: SqlitePool,
    db_path: PathBuf,
    describer: SqliteDescriber,
}

impl SqliteConnector {
    pub fn new(pool: SqlitePool, db_path: impl Into<PathBuf>) -> Self {
        SqliteConnector { describer: SqliteDescriber::new(pool.clone()), db_path: db_path.into(), pool }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn capabilities(&self) -> Capabilities {
        sqlite_capabilities()
    }

    async fn describe(&self, managed_schemas: &[String]) -> Result<SqlSchema, MigrationError> {
        self.describer
            .describe(managed_schemas)
            .await
            .map_err(|e| MigrationError::from_driver("introspect", anyhow::Error::new(e)))
    }

    async fn execute(&self, plan: &MigrationPlan, options: &ExecuteOptions) -> Result<ExecutionReport, MigrationError> {
        executor::execute_sqlite(&self.pool, &self.db_path, plan, options).await
    }
}
