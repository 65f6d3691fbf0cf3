use migration_connector::ParserError;
use sql_schema_describer::{
    CheckConstraint, Column, ColumnArity, ColumnType, ColumnTypeFamily, DefaultValue, EnumType, ForeignKey,
    ForeignKeyAction, Index, PrimaryKey, SqlSchema, Table, UniqueConstraint, View, ViewCheckOption,
};
use sqlparser::ast::{
    ColumnDef, ColumnOption, DataType, Ident, ObjectName, ReferentialAction, SchemaName, Statement, TableConstraint,
    UserDefinedTypeRepresentation,
};

use crate::SqlDialectKind;

/// Applies one already-vetted (non-imperative) statement to the schema under construction.
/// Statements dbterra has no opinion about (e.g. a bare `SET`, or an extension's own DDL we
/// don't model) are silently skipped rather than rejected: declarative-intent enforcement
/// lives in `declarative::reject_if_imperative`, not here.
pub fn apply_statement(stmt: &Statement, schema: &mut SqlSchema, dialect: SqlDialectKind) -> Result<(), ParserError> {
    match stmt {
        Statement::CreateTable { name, columns, constraints, .. } => {
            let table = build_table(name, columns, constraints, dialect)?;
            register_schema(schema, &table.schema);
            schema.tables.push(table);
        }
        Statement::CreateView { name, query, materialized, with_options, .. } => {
            let view = build_view(name, query.to_string(), *materialized, with_options, dialect);
            register_schema(schema, &view.schema);
            schema.views.push(view);
        }
        Statement::CreateType { name, representation: UserDefinedTypeRepresentation::Enum { labels } } => {
            let (enum_schema, enum_name) = split_name(name, dialect);
            register_schema(schema, &enum_schema);
            schema.enums.push(EnumType {
                schema: enum_schema,
                name: enum_name,
                values: labels.iter().map(ident_value).collect(),
            });
        }
        Statement::CreateSchema { schema_name, .. } => {
            if let SchemaName::Simple(name) = schema_name {
                register_schema(schema, &name.to_string());
            }
        }
        Statement::CreateIndex { name, table_name, columns, unique, concurrently, .. } => {
            let (table_schema, table) = split_name(table_name, dialect);
            let index_name = name
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("{table}_{}_idx", columns.iter().map(|c| c.expr.to_string()).collect::<Vec<_>>().join("_")));
            if let Some(t) = schema.tables.iter_mut().find(|t| t.schema == table_schema && t.name == table) {
                t.indexes.push(Index {
                    name: index_name,
                    table: table.clone(),
                    columns: columns.iter().map(|c| c.expr.to_string()).collect(),
                    unique: *unique,
                    concurrent: *concurrently,
                });
            }
        }
        _ => {}
    }

    Ok(())
}

fn register_schema(schema: &mut SqlSchema, name: &str) {
    if !schema.schemas.iter().any(|s| s == name) {
        schema.schemas.push(name.to_string());
    }
}

fn split_name(name: &ObjectName, dialect: SqlDialectKind) -> (String, String) {
    let default_schema = match dialect {
        SqlDialectKind::Postgres => "public",
        SqlDialectKind::Sqlite => "main",
    };
    match name.0.as_slice() {
        [schema, table] => (ident_value(schema), ident_value(table)),
        [table] => (default_schema.to_string(), ident_value(table)),
        parts => (default_schema.to_string(), parts.last().map(ident_value).unwrap_or_default()),
    }
}

fn ident_value(ident: &Ident) -> String {
    ident.value.clone()
}

fn build_table(
    name: &ObjectName,
    columns: &[ColumnDef],
    constraints: &[TableConstraint],
    dialect: SqlDialectKind,
) -> Result<Table, ParserError> {
    let (table_schema, table_name) = split_name(name, dialect);
    let mut table = Table::new(table_schema.clone(), table_name.clone());

    let mut primary_key_columns: Vec<String> = Vec::new();
    let mut primary_key_name: Option<String> = None;

    for column_def in columns {
        let mut nullable = true;
        let mut default = None;
        let mut is_primary = false;

        for option_def in &column_def.options {
            match &option_def.option {
                ColumnOption::NotNull => nullable = false,
                ColumnOption::Null => nullable = true,
                ColumnOption::Default(expr) => default = Some(DefaultValue::new(expr.to_string())),
                ColumnOption::Unique { is_primary: true } => {
                    is_primary = true;
                    nullable = false;
                    primary_key_columns.push(ident_value(&column_def.name));
                }
                ColumnOption::Unique { is_primary: false } => {
                    table.uniques.push(UniqueConstraint {
                        name: None,
                        columns: vec![ident_value(&column_def.name)],
                    });
                }
                ColumnOption::ForeignKey { foreign_table, referred_columns, on_delete, on_update } => {
                    let (ref_schema, ref_table) = split_name(foreign_table, dialect);
                    table.foreign_keys.push(ForeignKey {
                        constraint_name: None,
                        columns: vec![ident_value(&column_def.name)],
                        referenced_schema: ref_schema,
                        referenced_table: ref_table,
                        referenced_columns: referred_columns.iter().map(ident_value).collect(),
                        on_delete: map_referential_action(*on_delete),
                        on_update: map_referential_action(*on_update),
                        deferrable: false,
                        references_unmanaged_table: false,
                    });
                }
                ColumnOption::Check(expr) => {
                    table.checks.push(CheckConstraint { name: None, expression: expr.to_string() });
                }
                _ => {}
            }
        }

        let surface = column_def.data_type.to_string();
        let tpe = ColumnType {
            full_data_type: surface.clone(),
            family: family_for(&column_def.data_type),
            arity: if nullable { ColumnArity::Nullable } else { ColumnArity::Required },
            native_type: None,
        };

        let column = Column::new(ident_value(&column_def.name), tpe, nullable, default, is_primary)
            .map_err(|e| ParserError::syntax(e.to_string(), None, None))?;
        table.columns.push(column);
    }

    for constraint in constraints {
        match constraint {
            TableConstraint::Unique { name, columns, is_primary: true } => {
                primary_key_name = name.as_ref().map(ident_value);
                primary_key_columns.extend(columns.iter().map(ident_value));
            }
            TableConstraint::Unique { name, columns, is_primary: false } => {
                table.uniques.push(UniqueConstraint {
                    name: name.as_ref().map(ident_value),
                    columns: columns.iter().map(ident_value).collect(),
                });
            }
            TableConstraint::ForeignKey { name, columns, foreign_table, referred_columns, on_delete, on_update } => {
                let (ref_schema, ref_table) = split_name(foreign_table, dialect);
                table.foreign_keys.push(ForeignKey {
                    constraint_name: name.as_ref().map(ident_value),
                    columns: columns.iter().map(ident_value).collect(),
                    referenced_schema: ref_schema,
                    referenced_table: ref_table,
                    referenced_columns: referred_columns.iter().map(ident_value).collect(),
                    on_delete: map_referential_action(*on_delete),
                    on_update: map_referential_action(*on_update),
                    deferrable: false,
                    references_unmanaged_table: false,
                });
            }
            TableConstraint::Check { name, expr } => {
                table.checks.push(CheckConstraint { name: name.as_ref().map(ident_value), expression: expr.to_string() });
            }
            _ => {}
        }
    }

    if !primary_key_columns.is_empty() {
        for column_name in &primary_key_columns {
            if let Some(column) = table.columns.iter_mut().find(|c| &c.name == column_name) {
                column.primary = true;
                column.nullable = false;
            }
        }
        table.primary_key = Some(PrimaryKey { constraint_name: primary_key_name, columns: primary_key_columns });
    }

    Ok(table)
}

fn map_referential_action(action: Option<ReferentialAction>) -> ForeignKeyAction {
    match action {
        Some(ReferentialAction::Cascade) => ForeignKeyAction::Cascade,
        Some(ReferentialAction::Restrict) => ForeignKeyAction::Restrict,
        Some(ReferentialAction::SetNull) => ForeignKeyAction::SetNull,
        Some(ReferentialAction::SetDefault) => ForeignKeyAction::SetDefault,
        Some(ReferentialAction::NoAction) | None => ForeignKeyAction::NoAction,
    }
}

fn family_for(data_type: &DataType) -> ColumnTypeFamily {
    match data_type {
        DataType::TinyInt(_) | DataType::SmallInt(_) | DataType::Int(_) | DataType::Integer(_) => ColumnTypeFamily::Int,
        DataType::BigInt(_) => ColumnTypeFamily::BigInt,
        DataType::Float(_) | DataType::Real | DataType::Double | DataType::DoublePrecision => ColumnTypeFamily::Float,
        DataType::Decimal(_) | DataType::Numeric(_) => ColumnTypeFamily::Decimal,
        DataType::Boolean | DataType::Bool => ColumnTypeFamily::Boolean,
        DataType::Char(_)
        | DataType::Varchar(_)
        | DataType::CharVarying(_)
        | DataType::CharacterVarying(_)
        | DataType::Text
        | DataType::String(_) => ColumnTypeFamily::String,
        DataType::Timestamp(_, _) | DataType::Date | DataType::Time(_, _) | DataType::Datetime(_) => ColumnTypeFamily::DateTime,
        DataType::Blob(_) | DataType::Bytea | DataType::Binary(_) | DataType::Varbinary(_) => ColumnTypeFamily::Binary,
        DataType::JSON | DataType::JSONB => ColumnTypeFamily::Json,
        DataType::Uuid => ColumnTypeFamily::Uuid,
        DataType::Custom(name, _) => {
            let last = name.0.last().map(ident_value).unwrap_or_default().to_lowercase();
            match last.as_str() {
                "citext" => ColumnTypeFamily::String,
                "serial" | "bigserial" | "smallserial" => ColumnTypeFamily::Int,
                other => ColumnTypeFamily::Unsupported(other.to_string()),
            }
        }
        other => ColumnTypeFamily::Unsupported(other.to_string()),
    }
}

fn build_view(
    name: &ObjectName,
    definition: String,
    materialized: bool,
    with_options: &[sqlparser::ast::SqlOption],
    dialect: SqlDialectKind,
) -> View {
    let (view_schema, view_name) = split_name(name, dialect);

    let mut check_option = ViewCheckOption::None;
    let mut security_barrier = false;
    for option in with_options {
        let option_name = option.name.value.to_lowercase();
        let value = option.value.to_string().to_lowercase();
        match option_name.as_str() {
            "check_option" if value.contains("local") => check_option = ViewCheckOption::Local,
            "check_option" if value.contains("cascaded") => check_option = ViewCheckOption::Cascaded,
            "security_barrier" if value.contains("true") => security_barrier = true,
            _ => {}
        }
    }

    View {
        schema: view_schema,
        name: view_name,
        definition: definition.trim().trim_end_matches(';').trim().to_string(),
        materialized,
        check_option,
        security_barrier,
    }
}
