//! Connection-string dialect selection (spec.md §6): `postgres://`/`postgresql://` selects
//! Postgres; `sqlite://` or a bare path ending `.db`/`.sqlite` selects SQLite.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

pub fn from_connection_string(url: &str) -> Option<Dialect> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Some(Dialect::Postgres);
    }
    if url.starts_with("sqlite://") || url.ends_with(".db") || url.ends_with(".sqlite") {
        return Some(Dialect::Sqlite);
    }
    None
}

/// Extracts the filesystem path backing a `sqlite://` connection string (or returns the
/// input unchanged when it's already a bare path), for the executor's file-lock sibling.
pub fn sqlite_file_path(url: &str) -> &str {
    url.strip_prefix("sqlite://").unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_schemes_are_recognized() {
        assert_eq!(from_connection_string("postgres://localhost/db"), Some(Dialect::Postgres));
        assert_eq!(from_connection_string("postgresql://localhost/db"), Some(Dialect::Postgres));
    }

    #[test]
    fn sqlite_scheme_and_extensions_are_recognized() {
        assert_eq!(from_connection_string("sqlite://./dev.db"), Some(Dialect::Sqlite));
        assert_eq!(from_connection_string("./dev.db"), Some(Dialect::Sqlite));
        assert_eq!(from_connection_string("./dev.sqlite"), Some(Dialect::Sqlite));
    }

    #[test]
    fn unrecognized_scheme_returns_none() {
        assert_eq!(from_connection_string("mysql://localhost/db"), None);
    }

    #[test]
    fn sqlite_file_path_strips_scheme() {
        assert_eq!(sqlite_file_path("sqlite://./dev.db"), "./dev.db");
        assert_eq!(sqlite_file_path("./dev.db"), "./dev.db");
    }
}
