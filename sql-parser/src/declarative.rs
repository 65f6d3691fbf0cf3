use migration_connector::ParserError;
use sqlparser::ast::Statement;

/// Rejects any statement that mutates rather than describes state. This is a structural
/// check on the typed AST, not a keyword scan over raw text, so a `DROP` appearing inside a
/// string literal or a comment never trips it (spec.md §4.1).
///
/// `ON DELETE`/`ON UPDATE` need no special casing here: they surface as
/// `ReferentialAction` fields nested inside `CREATE TABLE`'s column options and table
/// constraints, never as their own top-level `Statement` variant.
pub fn reject_if_imperative(stmt: &Statement) -> Result<(), ParserError> {
    let verb = match stmt {
        Statement::AlterTable { .. } => Some("ALTER"),
        Statement::Drop { .. } => Some("DROP"),
        Statement::Truncate { .. } => Some("TRUNCATE"),
        Statement::Insert { .. } => Some("INSERT"),
        Statement::Update { .. } => Some("UPDATE"),
        Statement::Delete { .. } => Some("DELETE"),
        Statement::Grant { .. } => Some("GRANT"),
        Statement::Revoke { .. } => Some("REVOKE"),
        Statement::Comment { .. } => Some("COMMENT"),
        _ => None,
    };

    match verb {
        Some(verb) => Err(ParserError::forbidden_statement(verb, None, stmt.to_string())),
        None => Ok(()),
    }
}
