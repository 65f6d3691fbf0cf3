//! Advisory locking for the executor's serialization guarantee (spec.md §5). Postgres uses
//! `pg_try_advisory_lock`; SQLite has no server-side equivalent so we fall back to an
//! exclusive `flock` on a sibling lock file for the duration of the transactional and
//! concurrent phases.

use std::path::Path;
use std::time::Duration;

use fs2::FileExt;
use migration_connector::MigrationError;
use sqlx::PgPool;
use tokio::time::sleep;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// FNV-1a over the lock name, reinterpreted as a signed `i64` for `pg_advisory_lock`'s
/// `bigint` key parameter (spec.md §5: "the 64-bit hash of `lockName`").
pub fn fnv1a_hash(name: &str) -> i64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash as i64
}

pub struct PostgresAdvisoryLock {
    key: i64,
    held: bool,
}

impl PostgresAdvisoryLock {
    pub async fn acquire(pool: &PgPool, lock_name: &str, timeout: Duration) -> Result<Self, MigrationError> {
        let key = fnv1a_hash(lock_name);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
                .bind(key)
                .fetch_one(pool)
                .await
                .map_err(|e| MigrationError::from_driver(format!("pg_try_advisory_lock({lock_name})"), e.into()))?;

            if acquired.0 {
                return Ok(PostgresAdvisoryLock { key, held: true });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(MigrationError::lock_timeout(lock_name, timeout.as_secs()));
            }

            sleep(backoff.min(MAX_BACKOFF)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    pub async fn release(mut self, pool: &PgPool) {
        if !self.held {
            return;
        }
        if let Err(error) = sqlx::query("SELECT pg_advisory_unlock($1)").bind(self.key).execute(pool).await {
            tracing::warn!(%error, "failed to release postgres advisory lock");
        }
        self.held = false;
    }
}

/// SQLite fallback: an exclusive, non-blocking `flock` loop on `<db-file>.dbterra-lock`,
/// polled with the same backoff schedule as the Postgres path so both dialects honor the
/// same `lockTimeoutSeconds` contract.
pub struct FileLock {
    file: std::fs::File,
}

impl FileLock {
    pub async fn acquire(db_path: &Path, timeout: Duration) -> Result<Self, MigrationError> {
        let lock_path = db_path.with_extension("dbterra-lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| MigrationError::from_driver(format!("open lock file {}", lock_path.display()), anyhow::Error::new(e)))?;

        let deadline = tokio::time::Instant::now() + timeout;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if file.try_lock_exclusive().is_ok() {
                return Ok(FileLock { file });
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MigrationError::lock_timeout(&lock_path.display().to_string(), timeout.as_secs()));
            }
            sleep(backoff.min(MAX_BACKOFF)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    pub fn release(self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(fnv1a_hash("dbterra_migrate_execute"), fnv1a_hash("dbterra_migrate_execute"));
    }

    #[test]
    fn different_names_hash_differently() {
        assert_ne!(fnv1a_hash("dbterra_migrate_execute"), fnv1a_hash("some_other_lock"));
    }

    #[tokio::test]
    async fn second_acquirer_times_out_while_first_holds_the_file_lock() {
        let dir = tempfile_dir();
        let db_path = dir.join("schema.db");

        let first = FileLock::acquire(&db_path, Duration::from_secs(1)).await.unwrap();
        let second = FileLock::acquire(&db_path, Duration::from_millis(200)).await;
        assert!(second.is_err(), "a second acquirer must not observe the lock as free");

        first.release();
        let third = FileLock::acquire(&db_path, Duration::from_secs(1)).await;
        assert!(third.is_ok(), "the lock must become available once released");
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("dbterra-lock-test-{}", fnv1a_hash(&format!("{:?}", std::time::SystemTime::now()))));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
