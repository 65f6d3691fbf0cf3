//! SQL Parser (C1). Parses a desired-state SQL file into a `SqlSchema`, rejecting any
//! statement whose primary verb mutates rather than describes state (spec.md §4.1).
//!
//! Built on `sqlparser`'s `PostgreSqlDialect`/`SQLiteDialect` rather than a hand-rolled
//! lexer: both dialects dbterra supports are ones `sqlparser` already ships, and matching on
//! its typed `Statement` enum is what makes declarative-intent enforcement structural
//! instead of a keyword-sniffing regex that a string literal could fool.

mod convert;
mod declarative;

use std::fs;
use std::path::Path;

use migration_connector::ParserError;
use sql_schema_describer::SqlSchema;
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialectKind {
    Postgres,
    Sqlite,
}

impl SqlDialectKind {
    fn dialect(self) -> Box<dyn Dialect> {
        match self {
            SqlDialectKind::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialectKind::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}

/// Parse the desired-state SQL text directly (used by tests and by `parse_file` below).
pub fn parse(text: &str, dialect: SqlDialectKind) -> Result<SqlSchema, ParserError> {
    let statements = Parser::parse_sql(dialect.dialect().as_ref(), text).map_err(|e| parser_error_from(e, text))?;

    let mut schema = SqlSchema::default();
    for statement in &statements {
        declarative::reject_if_imperative(statement)?;
        convert::apply_statement(statement, &mut schema, dialect)?;
    }

    Ok(schema)
}

/// Parse the desired-state SQL file at `path`. `ParserError::file_not_found` is raised with
/// `filePath` set when the read fails, per spec.md §4.1.
pub fn parse_file(path: &Path, dialect: SqlDialectKind) -> Result<SqlSchema, ParserError> {
    let text = fs::read_to_string(path).map_err(|_| ParserError::file_not_found(path.display().to_string()))?;
    parse(&text, dialect)
}

fn parser_error_from(err: sqlparser::parser::ParserError, source: &str) -> ParserError {
    let message = err.to_string();
    let (line, column) = extract_line_column(&message);
    let mut parser_error = ParserError::syntax(message, line, column);
    if let Some(line_no) = line {
        parser_error.sql_snippet = source.lines().nth(line_no.saturating_sub(1)).map(str::to_string);
    }
    parser_error
}

/// sqlparser's error `Display` text is of the form `"... Line: 3, Column: 12"`; pull both
/// out when present rather than re-parsing the whole file ourselves.
fn extract_line_column(message: &str) -> (Option<usize>, Option<usize>) {
    let line = message
        .split("Line: ")
        .nth(1)
        .and_then(|rest| rest.split(',').next())
        .and_then(|n| n.trim().parse().ok());
    let column = message
        .split("Column: ")
        .nth(1)
        .and_then(|rest| rest.split(|c: char| !c.is_ascii_digit()).next())
        .and_then(|n| n.trim().parse().ok());
    (line, column)
}
