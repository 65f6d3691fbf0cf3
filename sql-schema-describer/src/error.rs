use thiserror::Error;

/// Failure describing the live database. Distinct from the four error kinds in
/// `dbterra-connector` because introspection failures are almost always a connectivity or
/// permissions problem, not a planning one, and callers want to tell the two apart.
#[derive(Debug, Error)]
pub enum DescriberError {
    #[error("failed to query the database while introspecting: {0}")]
    Query(#[from] sqlx::Error),

    #[error("schema `{0}` does not exist")]
    UnknownSchema(String),

    #[error("unsupported column type `{full_data_type}` on {schema}.{table}.{column}")]
    UnsupportedType {
        schema: String,
        table: String,
        column: String,
        full_data_type: String,
    },
}
