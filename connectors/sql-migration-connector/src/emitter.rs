//! SQL Emitter (C6). The one place in the crate that formats SQL text; the differ calls
//! these functions and never builds a `String` of DDL by hand (spec.md §4.4.2).

use migration_connector::Statement;
use sql_schema_describer::{normalize, Column, ForeignKey, Table, View};

/// A fluent builder guaranteeing single-space joins between phrases. Used for the handful of
/// statements whose shape doesn't fit one of the statement-level helpers below.
#[derive(Debug, Default)]
pub struct DdlBuilder {
    parts: Vec<String>,
}

impl DdlBuilder {
    pub fn new() -> Self {
        DdlBuilder::default()
    }

    pub fn keyword(mut self, kw: &str) -> Self {
        self.parts.push(kw.to_string());
        self
    }

    pub fn ident(mut self, schema: Option<&str>, name: &str) -> Self {
        self.parts.push(match schema {
            Some(schema) => qualified_ident(schema, name),
            None => quote_ident(name),
        });
        self
    }

    pub fn raw(mut self, text: impl Into<String>) -> Self {
        self.parts.push(text.into());
        self
    }

    pub fn paren_list(mut self, items: impl IntoIterator<Item = String>) -> Self {
        let joined = items.into_iter().collect::<Vec<_>>().join(", ");
        self.parts.push(format!("({joined})"));
        self
    }

    pub fn build(self) -> String {
        self.parts.join(" ")
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn qualified_ident(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// The canonical spelling (spec.md §4.3), except for `SERIAL` and its variants: those are
/// sugar the database itself expands into an owned sequence plus a `nextval(...)` default,
/// so emitting the canonicalized `integer` would silently drop that behavior.
fn ddl_type(surface: &str) -> String {
    if normalize::is_serial_alias(surface) {
        surface.to_string()
    } else {
        normalize::canonical_type(surface)
    }
}

fn column_def_sql(column: &Column) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), ddl_type(&column.tpe.full_data_type));
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default.0);
    }
    sql
}

pub fn create_schema(name: &str) -> Statement {
    Statement::new(DdlBuilder::new().keyword("CREATE SCHEMA").raw(quote_ident(name)).build())
}

pub fn create_extension(name: &str) -> Statement {
    Statement::new(format!("CREATE EXTENSION IF NOT EXISTS \"{name}\""))
}

pub fn create_enum(schema: &str, name: &str, values: &[String]) -> Statement {
    let labels = values.iter().map(|v| format!("'{}'", v.replace('\'', "''"))).collect::<Vec<_>>().join(", ");
    Statement::new(format!("CREATE TYPE {} AS ENUM ({labels})", qualified_ident(schema, name)))
}

pub fn alter_type_add_value(schema: &str, name: &str, value: &str) -> Statement {
    Statement::new(format!(
        "ALTER TYPE {} ADD VALUE '{}'",
        qualified_ident(schema, name),
        value.replace('\'', "''")
    ))
}

pub fn drop_view(view: &View) -> Statement {
    let kw = if view.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
    Statement::new(format!("DROP {kw} IF EXISTS {}", qualified_ident(&view.schema, &view.name)))
}

pub fn create_view(view: &View) -> Statement {
    let kw = if view.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
    let mut sql = format!("CREATE {kw} {} AS {}", qualified_ident(&view.schema, &view.name), view.definition);
    match view.check_option {
        sql_schema_describer::ViewCheckOption::None => {}
        sql_schema_describer::ViewCheckOption::Local => sql.push_str(" WITH LOCAL CHECK OPTION"),
        sql_schema_describer::ViewCheckOption::Cascaded => sql.push_str(" WITH CASCADED CHECK OPTION"),
    }
    Statement::new(sql)
}

pub fn drop_foreign_key(table: &Table, fk: &ForeignKey) -> Statement {
    let name = fk.constraint_name.clone().unwrap_or_else(|| format!("{}_{}_fkey", table.name, fk.columns.join("_")));
    Statement::new(format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        qualified_ident(&table.schema, &table.name),
        quote_ident(&name)
    ))
}

pub fn create_table(table: &Table) -> Statement {
    let mut lines: Vec<String> = table.columns.iter().map(column_def_sql).collect();

    if let Some(pk) = &table.primary_key {
        let columns = pk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        lines.push(format!("PRIMARY KEY ({columns})"));
    }
    for unique in &table.uniques {
        let columns = unique.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        lines.push(format!("UNIQUE ({columns})"));
    }
    for check in &table.checks {
        lines.push(format!("CHECK ({})", check.expression));
    }
    for fk in &table.foreign_keys {
        lines.push(foreign_key_clause(fk));
    }

    Statement::new(format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualified_ident(&table.schema, &table.name),
        lines.join(",\n    ")
    ))
}

fn foreign_key_clause(fk: &ForeignKey) -> String {
    let columns = fk.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let referenced_columns = fk.referenced_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    format!(
        "FOREIGN KEY ({columns}) REFERENCES {} ({referenced_columns}) ON DELETE {} ON UPDATE {}",
        qualified_ident(&fk.referenced_schema, &fk.referenced_table),
        fk.on_delete.as_sql(),
        fk.on_update.as_sql(),
    )
}

pub fn drop_table_cascade(table: &Table) -> Statement {
    Statement::new(format!("DROP TABLE {} CASCADE", qualified_ident(&table.schema, &table.name)))
}

pub fn add_column(table: &Table, column: &Column) -> Statement {
    Statement::new(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        qualified_ident(&table.schema, &table.name),
        column_def_sql(column)
    ))
}

pub fn drop_column(table: &Table, column_name: &str) -> Statement {
    Statement::new(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        qualified_ident(&table.schema, &table.name),
        quote_ident(column_name)
    ))
}

pub fn drop_default(table: &Table, column_name: &str) -> Statement {
    Statement::new(format!(
        "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
        qualified_ident(&table.schema, &table.name),
        quote_ident(column_name)
    ))
}

pub fn alter_column_type(table: &Table, column: &Column, new_type: &str) -> Statement {
    let column_ident = quote_ident(&column.name);
    let new_type = ddl_type(new_type);
    Statement::new(format!(
        "ALTER TABLE {} ALTER COLUMN {column_ident} TYPE {new_type} USING {column_ident}::{new_type}",
        qualified_ident(&table.schema, &table.name),
    ))
}

pub fn set_default(table: &Table, column_name: &str, expression: &str) -> Statement {
    Statement::new(format!(
        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {expression}",
        qualified_ident(&table.schema, &table.name),
        quote_ident(column_name)
    ))
}

pub fn set_not_null(table: &Table, column_name: &str, not_null: bool) -> Statement {
    let verb = if not_null { "SET NOT NULL" } else { "DROP NOT NULL" };
    Statement::new(format!(
        "ALTER TABLE {} ALTER COLUMN {} {verb}",
        qualified_ident(&table.schema, &table.name),
        quote_ident(column_name)
    ))
}

pub fn add_foreign_key(table: &Table, fk: &ForeignKey) -> Statement {
    Statement::new(format!(
        "ALTER TABLE {} ADD {}",
        qualified_ident(&table.schema, &table.name),
        foreign_key_clause(fk)
    ))
}

pub fn add_unique(table: &Table, unique: &sql_schema_describer::UniqueConstraint) -> Statement {
    let columns = unique.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    Statement::new(format!("ALTER TABLE {} ADD UNIQUE ({columns})", qualified_ident(&table.schema, &table.name)))
}

pub fn add_check(table: &Table, check: &sql_schema_describer::CheckConstraint) -> Statement {
    Statement::new(format!(
        "ALTER TABLE {} ADD CHECK ({})",
        qualified_ident(&table.schema, &table.name),
        check.expression
    ))
}

pub fn create_index(table_schema: &str, index: &sql_schema_describer::Index) -> Statement {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let concurrently = if index.concurrent { "CONCURRENTLY " } else { "" };
    let columns = index.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    Statement::new(format!(
        "CREATE {unique}INDEX {concurrently}{} ON {} ({columns})",
        quote_ident(&index.name),
        qualified_ident(table_schema, &index.table),
    ))
}

pub fn drop_index(table_schema: &str, index: &sql_schema_describer::Index) -> Statement {
    let concurrently = if index.concurrent { "CONCURRENTLY " } else { "" };
    Statement::new(format!("DROP INDEX {concurrently}{}", qualified_ident(table_schema, &index.name)))
}

/// Dialects without `Capability::AlterColumnType` (SQLite) can't change a column's type in
/// place. This is SQLite's documented 12-step pattern collapsed to its essential four
/// statements: build the desired shape under a scratch name, copy over the columns that
/// exist on both sides, drop the old table, rename the scratch table into place.
pub fn rebuild_table_for_type_change(desired: &Table, current: &Table) -> Vec<Statement> {
    let scratch_name = format!("{}__dbterra_new", desired.name);
    let mut scratch = desired.clone();
    scratch.name = scratch_name.clone();

    let mut statements = vec![create_table(&scratch)];

    let shared_columns: Vec<&str> = desired
        .columns
        .iter()
        .filter(|c| current.column(&c.name).is_some())
        .map(|c| c.name.as_str())
        .collect();
    let column_list = shared_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");

    statements.push(Statement::new(format!(
        "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
        qualified_ident(&scratch.schema, &scratch.name),
        qualified_ident(&current.schema, &current.name),
    )));
    statements.push(Statement::new(format!("DROP TABLE {}", qualified_ident(&current.schema, &current.name))));
    statements.push(Statement::new(format!(
        "ALTER TABLE {} RENAME TO {}",
        qualified_ident(&scratch.schema, &scratch.name),
        quote_ident(&desired.name)
    )));

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_double_quoted_and_schema_qualified() {
        assert_eq!(qualified_ident("public", "users"), "\"public\".\"users\"");
    }

    #[test]
    fn embedded_quotes_are_escaped_by_doubling() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn create_schema_statement_is_not_destructive() {
        let stmt = create_schema("billing");
        assert_eq!(stmt.sql, "CREATE SCHEMA \"billing\"");
        assert!(!stmt.destructive);
    }

    #[test]
    fn drop_table_statement_is_flagged_destructive() {
        let table = Table::new("public", "posts");
        let stmt = drop_table_cascade(&table);
        assert!(stmt.destructive);
        assert!(stmt.sql.starts_with("DROP TABLE \"public\".\"posts\" CASCADE"));
    }

    #[test]
    fn builder_joins_parts_with_single_spaces() {
        let sql = DdlBuilder::new().keyword("CREATE SCHEMA").ident(None, "billing").build();
        assert_eq!(sql, "CREATE SCHEMA \"billing\"");
    }
}
