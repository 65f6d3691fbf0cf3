use thiserror::Error;

/// Raised by the parser: syntax errors, a missing file, or a deliberate rejection of a
/// non-declarative statement (spec.md §4.1, §7).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParserError {
    pub message: String,
    pub file_path: Option<String>,
    /// 1-based, populated from the underlying parse diagnostic when available.
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub sql_snippet: Option<String>,
    pub suggestion: Option<String>,
}

impl ParserError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        ParserError {
            message: format!("Schema file not found: {path}"),
            file_path: Some(path),
            line: None,
            column: None,
            sql_snippet: None,
            suggestion: None,
        }
    }

    pub fn forbidden_statement(verb: &str, line: Option<usize>, sql_snippet: impl Into<String>) -> Self {
        let suggestion = suggestion_for_verb(verb);
        ParserError {
            message: format!(
                "`{verb}` is an imperative statement; dbterra schema files may only describe \
                 desired state declaratively"
            ),
            file_path: None,
            line,
            column: None,
            sql_snippet: Some(sql_snippet.into()),
            suggestion: Some(suggestion),
        }
    }

    pub fn syntax(message: impl Into<String>, line: Option<usize>, column: Option<usize>) -> Self {
        let message = message.into();
        let suggestion = if message.to_lowercase().contains("unexpected end of input") {
            Some("check for missing parentheses or semicolons".to_string())
        } else {
            None
        };
        ParserError {
            message,
            file_path: None,
            line,
            column,
            sql_snippet: None,
            suggestion,
        }
    }
}

fn suggestion_for_verb(verb: &str) -> String {
    match verb.to_uppercase().as_str() {
        "ALTER" => "use `CREATE TABLE`; dbterra will emit `ALTER` for you".to_string(),
        "DROP" | "TRUNCATE" => "remove the object from your schema file".to_string(),
        "INSERT" | "UPDATE" | "DELETE" => {
            "dbterra manages schema only; perform data changes outside your schema file".to_string()
        }
        "GRANT" | "REVOKE" => "dbterra does not manage privileges; apply grants outside your schema file".to_string(),
        _ => "remove the statement from your schema file".to_string(),
    }
}

/// Raised by the executor: a failing DDL statement, or a lock-acquisition timeout
/// (spec.md §4.5, §7).
#[derive(Debug, Error)]
#[error("migration failed while executing: {statement}")]
pub struct MigrationError {
    pub statement: String,
    pub code: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<usize>,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl MigrationError {
    pub fn lock_timeout(lock_name: &str, timeout_seconds: u64) -> Self {
        MigrationError {
            statement: format!("pg_advisory_lock({lock_name})"),
            code: None,
            detail: Some(format!(
                "could not acquire advisory lock `{lock_name}` within {timeout_seconds}s; \
                 another dbterra run is likely in progress"
            )),
            hint: None,
            position: None,
            source: None,
        }
    }

    pub fn from_driver(statement: impl Into<String>, source: anyhow::Error) -> Self {
        MigrationError {
            statement: statement.into(),
            code: None,
            detail: Some(source.to_string()),
            hint: None,
            position: None,
            source: Some(source),
        }
    }
}

/// Raised when the differ cannot find a valid topological order for foreign-key-dependent
/// `CREATE TABLE` statements — an FK that references a table present in neither snapshot
/// (spec.md §4.4 phase 6, §7).
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error(
        "table \"{schema}\".\"{table}\" has a foreign key to \"{referenced_schema}\".\"{referenced_table}\", \
         which does not exist in the desired schema or the current database"
    )]
    MissingReferencedTable {
        schema: String,
        table: String,
        referenced_schema: String,
        referenced_table: String,
    },

    #[error("foreign key dependency cycle involving tables: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Raised before any statement is emitted, when the desired state violates a semantic
/// invariant the differ cannot safely reconcile (spec.md §4.4 phase 3, §7).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(
        "enum \"{schema}\".\"{name}\" would lose value \"{value}\"; dbterra only ever adds enum \
         values, it never removes or reorders them"
    )]
    EnumValueRemoved { schema: String, name: String, value: String },

    #[error(
        "enum \"{schema}\".\"{name}\" values would be reordered, which Postgres cannot express \
         without a type rebuild dbterra does not perform"
    )]
    EnumValuesReordered { schema: String, name: String },
}
