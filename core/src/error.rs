use migration_connector::{DependencyError, MigrationError, ParserError, ValidationError};
use sql_migration_connector::DiffError;
use thiserror::Error;

/// The one error type `apply` returns. Each of the four taxonomy members (spec.md §7) comes
/// through unchanged from whichever component raised it; `Connection` covers failures that
/// happen before any of the four components has anything to say (bad URL, unreachable host).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not determine a dialect for connection string {0:?}")]
    UnknownDialect(String),
    #[error("{0}")]
    Connection(#[source] anyhow::Error),
}

impl From<DiffError> for CoreError {
    fn from(err: DiffError) -> Self {
        match err {
            DiffError::Dependency(e) => CoreError::Dependency(e),
            DiffError::Validation(e) => CoreError::Validation(e),
        }
    }
}
