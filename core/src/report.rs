//! Top-level error formatter (spec.md §7): every error reaching `dbterra-cli` passes through
//! here once, rendering a location, a highlighted statement or snippet, and a remediation
//! hint where one is available.

use migration_connector::{DependencyError, MigrationError, ParserError, ValidationError};

use crate::error::CoreError;

pub fn format_error(error: &CoreError) -> String {
    match error {
        CoreError::Parser(e) => format_parser_error(e),
        CoreError::Migration(e) => format_migration_error(e),
        CoreError::Dependency(e) => format_dependency_error(e),
        CoreError::Validation(e) => format_validation_error(e),
        CoreError::UnknownDialect(url) => format!("error: could not determine a dialect for `{url}`"),
        CoreError::Connection(e) => format!("error: {e}"),
    }
}

fn format_parser_error(error: &ParserError) -> String {
    let mut out = String::from("error: ");
    out.push_str(&error.message);

    if let Some(path) = &error.file_path {
        out.push_str(&format!("\n  --> {path}"));
    } else if let Some(line) = error.line {
        out.push_str(&format!("\n  --> line {line}"));
        if let Some(column) = error.column {
            out.push_str(&format!(":{column}"));
        }
    }
    if let Some(snippet) = &error.sql_snippet {
        out.push_str(&format!("\n  |\n  | {snippet}"));
    }
    if let Some(hint) = &error.suggestion {
        out.push_str(&format!("\nhint: {hint}"));
    }
    out
}

fn format_migration_error(error: &MigrationError) -> String {
    let mut out = format!("error: {error}");
    if !error.statement.is_empty() {
        out.push_str(&format!("\n  |\n  | {}", error.statement));
    }
    if let Some(code) = &error.code {
        out.push_str(&format!("\ncode: {code}"));
    }
    if let Some(detail) = &error.detail {
        out.push_str(&format!("\ndetail: {detail}"));
    }
    if let Some(hint) = &error.hint {
        out.push_str(&format!("\nhint: {hint}"));
    }
    out
}

fn format_dependency_error(error: &DependencyError) -> String {
    format!("error: {error}")
}

fn format_validation_error(error: &ValidationError) -> String {
    format!("error: {error}")
}
