/// One DDL statement the differ emitted, tagged destructive at emission time rather than
/// re-derived by string matching downstream (see SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub destructive: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let destructive = is_destructive(&sql);
        Statement { sql, destructive }
    }
}

/// spec.md §4.4.1: destructive iff the statement begins with one of these prefixes
/// (case-insensitive) or contains `DROP COLUMN`.
fn is_destructive(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    const PREFIXES: &[&str] = &["DROP TABLE", "DROP TYPE", "DROP VIEW", "DROP MATERIALIZED VIEW"];
    PREFIXES.iter().any(|p| upper.starts_with(p)) || upper.contains("DROP COLUMN")
}

/// `(transactional, concurrent)` — an ordered pair of DDL statement lists (spec.md §3, §6
/// glossary). Produced once by the differ and consumed once by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub transactional: Vec<Statement>,
    pub concurrent: Vec<Statement>,
}

impl MigrationPlan {
    pub fn has_changes(&self) -> bool {
        !self.transactional.is_empty() || !self.concurrent.is_empty()
    }

    pub fn has_destructive_statements(&self) -> bool {
        self.transactional.iter().chain(&self.concurrent).any(|s| s.destructive)
    }

    pub fn push_transactional(&mut self, sql: impl Into<String>) {
        self.transactional.push(Statement::new(sql));
    }

    pub fn push_concurrent(&mut self, sql: impl Into<String>) {
        self.concurrent.push(Statement::new(sql));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_plan_has_no_changes() {
        assert!(!MigrationPlan::default().has_changes());
    }

    #[test]
    fn drop_table_is_destructive() {
        let stmt = Statement::new(r#"DROP TABLE "public"."posts" CASCADE"#);
        assert!(stmt.destructive);
    }

    #[test]
    fn drop_column_mid_statement_is_destructive() {
        let stmt = Statement::new(r#"ALTER TABLE "public"."users" DROP COLUMN "name""#);
        assert!(stmt.destructive);
    }

    #[test]
    fn add_column_is_not_destructive() {
        let stmt = Statement::new(r#"ALTER TABLE "public"."users" ADD COLUMN "email" text"#);
        assert!(!stmt.destructive);
    }

    #[test]
    fn destructive_statement_flags_the_plan() {
        let mut plan = MigrationPlan::default();
        plan.push_transactional(r#"DROP TABLE "public"."posts" CASCADE"#);
        assert!(plan.has_destructive_statements());
    }
}
