use enumflags2::{bitflags, BitFlags};

/// The dialect capability record from SPEC_FULL.md §9. The differ consults this before
/// emitting anything dialect-specific rather than hard-coding a Postgres-only assumption,
/// so adding a third dialect later means implementing `Connector` and returning the right
/// `Capabilities`, not touching the differ.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// `pg_advisory_lock` or equivalent server-side named mutex.
    AdvisoryLocks,
    /// `CREATE INDEX CONCURRENTLY` / `DROP INDEX CONCURRENTLY`.
    ConcurrentIndex,
    /// `ALTER TABLE ... ALTER COLUMN ... TYPE ...` as a single statement, rather than a
    /// table-rebuild.
    AlterColumnType,
    /// `CREATE TYPE ... AS ENUM`.
    Enums,
    /// Multiple named schemas within one database/catalog.
    Schemas,
}

pub type Capabilities = BitFlags<Capability>;

pub fn postgres_capabilities() -> Capabilities {
    Capability::AdvisoryLocks
        | Capability::ConcurrentIndex
        | Capability::AlterColumnType
        | Capability::Enums
        | Capability::Schemas
}

pub fn sqlite_capabilities() -> Capabilities {
    BitFlags::empty()
}
