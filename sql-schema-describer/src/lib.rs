//! Dialect-agnostic schema object model, shared by the SQL parser (desired state), the
//! live-database introspectors (current state), and the differ, which is the only consumer
//! that ever normalizes one against the other.

mod error;
mod model;
pub mod normalize;
pub mod postgres;
pub mod sqlite;

pub use error::DescriberError;
pub use model::*;

use async_trait::async_trait;

/// One implementation per dialect. `dbterra-core` picks the implementation at startup from
/// the connection string and holds it as `Box<dyn SchemaDescriber>` for the run.
#[async_trait]
pub trait SchemaDescriber: Send + Sync {
    /// Describe the given managed schemas. Schemas not named here are never touched, with
    /// the one exception spec.md §4.2 calls out: foreign keys from managed tables into
    /// unmanaged tables are still captured, as opaque references, on the owning table.
    async fn describe(&self, managed_schemas: &[String]) -> Result<SqlSchema, DescriberError>;
}
