//! SQLite introspector (C2, second dialect). SQLite has no schemas, no enum types, and no
//! `information_schema`; everything here goes through `PRAGMA` statements and
//! `sqlite_master`, and every table is reported under the single pseudo-schema `"main"` so
//! the rest of the pipeline never has to special-case "no schema concept".

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::{
    Column, ColumnArity, ColumnType, ColumnTypeFamily, DefaultValue, DescriberError, ForeignKey, ForeignKeyAction,
    Index, PrimaryKey, SchemaDescriber, SqlSchema, Table, View, ViewCheckOption,
};

const MAIN_SCHEMA: &str = "main";

pub struct SqliteDescriber {
    pool: SqlitePool,
}

impl SqliteDescriber {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteDescriber { pool }
    }
}

#[async_trait]
impl SchemaDescriber for SqliteDescriber {
    async fn describe(&self, managed_schemas: &[String]) -> Result<SqlSchema, DescriberError> {
        // SQLite is single-schema; `managed_schemas` is only meaningful as a guard that the
        // caller didn't ask for something other than "main".
        let schemas = if managed_schemas.iter().any(|s| s == MAIN_SCHEMA) {
            vec![MAIN_SCHEMA.to_string()]
        } else {
            Vec::new()
        };

        let mut schema = SqlSchema {
            schemas,
            ..Default::default()
        };

        if schema.schemas.is_empty() {
            return Ok(schema);
        }

        let table_names = self.table_names().await?;
        let mut tables = Vec::with_capacity(table_names.len());
        for name in &table_names {
            tables.push(self.describe_table(name).await?);
        }
        schema.tables = tables;
        schema.views = self.describe_views().await?;

        Ok(schema)
    }
}

impl SqliteDescriber {
    async fn table_names(&self) -> Result<Vec<String>, DescriberError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get::<String, _>("name")).collect())
    }

    async fn describe_table(&self, name: &str) -> Result<Table, DescriberError> {
        let mut table = Table::new(MAIN_SCHEMA, name);

        let column_rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(name)))
            .fetch_all(&self.pool)
            .await?;

        let mut pk_columns = Vec::new();
        for row in &column_rows {
            let pk_index: i64 = row.get("pk");
            if pk_index > 0 {
                pk_columns.push((pk_index, row.get::<String, _>("name")));
            }
        }
        pk_columns.sort_by_key(|(idx, _)| *idx);
        let pk_names: Vec<String> = pk_columns.into_iter().map(|(_, name)| name).collect();

        for row in column_rows {
            let name: String = row.get("name");
            let declared_type: String = row.get("type");
            let not_null: i64 = row.get("notnull");
            let default_value: Option<String> = row.get("dflt_value");
            let is_primary = pk_names.contains(&name);
            let nullable = not_null == 0 && !is_primary;

            let column = Column::new(
                name,
                ColumnType {
                    family: sqlite_type_family(&declared_type),
                    full_data_type: declared_type,
                    arity: if nullable { ColumnArity::Nullable } else { ColumnArity::Required },
                    native_type: None,
                },
                nullable,
                default_value.map(DefaultValue::new),
                is_primary,
            )
            .expect("sqlite primary key columns are reported NOT NULL");

            table.columns.push(column);
        }

        if !pk_names.is_empty() {
            table.primary_key = Some(PrimaryKey {
                constraint_name: None,
                columns: pk_names,
            });
        }

        table.foreign_keys = self.describe_foreign_keys(name).await?;
        table.indexes = self.describe_indexes(name).await?;

        Ok(table)
    }

    async fn describe_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, DescriberError> {
        let rows = sqlx::query(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await?;

        // PRAGMA foreign_key_list emits one row per referenced column, sharing an `id`.
        use std::collections::BTreeMap;
        let mut by_id: BTreeMap<i64, ForeignKey> = BTreeMap::new();

        for row in rows {
            let id: i64 = row.get("id");
            let referenced_table: String = row.get("table");
            let from: String = row.get("from");
            let to: String = row.get("to");
            let on_update: String = row.get("on_update");
            let on_delete: String = row.get("on_delete");

            let entry = by_id.entry(id).or_insert_with(|| ForeignKey {
                constraint_name: None,
                columns: Vec::new(),
                referenced_schema: MAIN_SCHEMA.to_string(),
                referenced_table: referenced_table.clone(),
                referenced_columns: Vec::new(),
                on_delete: sqlite_fk_action(&on_delete),
                on_update: sqlite_fk_action(&on_update),
                deferrable: false,
                references_unmanaged_table: false,
            });
            entry.columns.push(from);
            entry.referenced_columns.push(to);
        }

        Ok(by_id.into_values().collect())
    }

    async fn describe_indexes(&self, table: &str) -> Result<Vec<Index>, DescriberError> {
        let index_rows = sqlx::query(&format!("PRAGMA index_list({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await?;

        let mut indexes = Vec::new();
        for row in index_rows {
            let name: String = row.get("name");
            let unique: i64 = row.get("unique");
            // `origin = 'pk'` means this index backs the primary key / an inline UNIQUE and
            // should not be surfaced as a separate index the differ could try to drop.
            let origin: String = row.get("origin");
            if origin == "pk" {
                continue;
            }

            let column_rows = sqlx::query(&format!("PRAGMA index_info({})", quote_ident(&name)))
                .fetch_all(&self.pool)
                .await?;
            let columns = column_rows
                .into_iter()
                .map(|row| row.get::<String, _>("name"))
                .collect();

            indexes.push(Index {
                name,
                table: table.to_string(),
                columns,
                unique: unique != 0,
                // SQLite has no `CONCURRENTLY`; Capabilities::ConcurrentIndex is unset for
                // this dialect and the differ never asks for one.
                concurrent: false,
            });
        }

        Ok(indexes)
    }

    async fn describe_views(&self) -> Result<Vec<View>, DescriberError> {
        let rows = sqlx::query("SELECT name, sql FROM sqlite_master WHERE type = 'view'")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let name: String = row.get("name");
                let sql: String = row.get("sql");
                let definition = sql
                    .splitn(2, "AS")
                    .nth(1)
                    .unwrap_or(&sql)
                    .trim()
                    .trim_end_matches(';')
                    .to_string();

                View {
                    schema: MAIN_SCHEMA.to_string(),
                    name,
                    definition,
                    materialized: false,
                    check_option: ViewCheckOption::None,
                    security_barrier: false,
                }
            })
            .collect())
    }
}

fn sqlite_type_family(declared_type: &str) -> ColumnTypeFamily {
    let upper = declared_type.to_uppercase();
    if upper.contains("INT") {
        ColumnTypeFamily::Int
    } else if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
        ColumnTypeFamily::String
    } else if upper.contains("BLOB") || upper.is_empty() {
        ColumnTypeFamily::Binary
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") || upper.contains("NUMERIC")
    {
        ColumnTypeFamily::Decimal
    } else if upper.contains("BOOL") {
        ColumnTypeFamily::Boolean
    } else if upper.contains("DATE") || upper.contains("TIME") {
        ColumnTypeFamily::DateTime
    } else {
        ColumnTypeFamily::Unsupported(declared_type.to_string())
    }
}

fn sqlite_fk_action(action: &str) -> ForeignKeyAction {
    match action {
        "CASCADE" => ForeignKeyAction::Cascade,
        "RESTRICT" => ForeignKeyAction::Restrict,
        "SET NULL" => ForeignKeyAction::SetNull,
        "SET DEFAULT" => ForeignKeyAction::SetDefault,
        _ => ForeignKeyAction::NoAction,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
