use async_trait::async_trait;
use migration_connector::{
    postgres_capabilities, Capabilities, Connector, ExecuteOptions, ExecutionReport, MigrationError, MigrationPlan,
};
use sql_schema_describer::{postgres::PostgresDescriber, SchemaDescriber, SqlSchema};
use sqlx::PgPool;

use crate::executor;

pub struct PostgresConnector {
    pool: PgPool,
    describer: PostgresDescriber,
}

impl PostgresConnector {
    pub fn new(pool: PgPool) -> Self {
        PostgresConnector { describer: PostgresDescriber::new(pool.clone()), pool }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn capabilities(&self) -> Capabilities {
        postgres_capabilities()
    }

    async fn describe(&self, managed_schemas: &[String]) -> Result<SqlSchema, MigrationError> {
        self.describer
            .describe(managed_schemas)
            .await
            .map_err(|e| MigrationError::from_driver("introspect", anyhow::Error::new(e)))
    }

    async fn execute(&self, plan: &MigrationPlan, options: &ExecuteOptions) -> Result<ExecutionReport, MigrationError> {
        executor::execute_postgres(&self.pool, plan, options).await
    }
}
