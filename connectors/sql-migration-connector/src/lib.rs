//! Postgres and SQLite `Connector` implementations: the differ (C4), the SQL emitter (C6),
//! the advisory-lock executor (C5), and the lock primitives they share.

pub mod differ;
pub mod emitter;
mod executor;
mod lock;
mod postgres_connector;
mod sqlite_connector;

pub use differ::{diff, DiffError};
pub use postgres_connector::PostgresConnector;
pub use sqlite_connector::SqliteConnector;
