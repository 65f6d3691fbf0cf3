use serde::{Deserialize, Serialize};

/// A full snapshot of the managed portion of a database: either the desired state parsed
/// from the user's SQL file, or the current state introspected live. Column order inside a
/// `Table` matters for `CREATE TABLE` emission; every other collection is compared as a set
/// by the differ (see `sql-migration-connector::differ`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlSchema {
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub enums: Vec<EnumType>,
    pub sequences: Vec<Sequence>,
    pub extensions: Vec<String>,
    /// Schemas that exist in this snapshot. For the desired snapshot this is whatever
    /// `CREATE SCHEMA` statements the user wrote plus the managed schemas implied by table
    /// definitions; for the current snapshot it is every managed schema that exists.
    pub schemas: Vec<String>,
    pub comments: Vec<Comment>,
    /// Functions, procedures and triggers, carried opaquely. The differ never creates,
    /// alters, or drops these (spec.md Non-goals); they exist so `dbterra apply --dry-run`
    /// can report what it is deliberately leaving alone.
    pub catalog_objects: Vec<CatalogObject>,
}

impl SqlSchema {
    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.schema == schema && t.name == name)
    }

    pub fn view(&self, schema: &str, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.schema == schema && v.name == name)
    }

    pub fn enum_type(&self, schema: &str, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.schema == schema && e.name == name)
    }

    pub fn has_changes_relative_to(&self, other: &SqlSchema) -> bool {
        self != other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Table {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub tpe: ColumnType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub primary: bool,
}

/// Raised when a caller tries to build a `Column` that violates the `primary ⇒ !nullable`
/// invariant from spec.md §3. The parser and introspector are the only two constructors of
/// `Column`, and both call `Column::new` rather than building the struct literal directly.
#[derive(Debug, thiserror::Error)]
#[error("column `{0}` is marked primary but also nullable, which spec.md §3 forbids")]
pub struct PrimaryNullableColumn(pub String);

impl Column {
    pub fn new(
        name: impl Into<String>,
        tpe: ColumnType,
        nullable: bool,
        default: Option<DefaultValue>,
        primary: bool,
    ) -> Result<Self, PrimaryNullableColumn> {
        let name = name.into();
        if primary && nullable {
            return Err(PrimaryNullableColumn(name));
        }
        Ok(Column {
            name,
            tpe,
            nullable,
            default,
            primary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    /// The surface type text as written (parser) or reported by the catalog (introspector),
    /// e.g. `"varchar(255)"` or `"int4"`. Canonicalization is deferred to
    /// `normalize::canonical_type` and applied only when the differ compares two columns.
    pub full_data_type: String,
    pub family: ColumnTypeFamily,
    pub arity: ColumnArity,
    /// Dialect-native type identifier, where one exists (e.g. Postgres OID name). Not used
    /// for equality; informational only, surfaced in error contexts.
    pub native_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnArity {
    Required,
    Nullable,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnTypeFamily {
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    String,
    DateTime,
    Binary,
    Json,
    Uuid,
    Enum(String),
    Unsupported(String),
}

/// A default expression in its surface form. `normalize::canonical_default` produces the
/// comparable form; two defaults compare equal iff their canonical forms are byte-identical
/// or both absent (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValue(pub String);

impl DefaultValue {
    pub fn new(expression: impl Into<String>) -> Self {
        DefaultValue(expression.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub constraint_name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub constraint_name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
    pub deferrable: bool,
    /// True when `referenced_schema`/`referenced_table` is not a managed schema. Such FKs
    /// are preserved as opaque references and the differ never drops them (spec.md §4.2).
    pub references_unmanaged_table: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl ForeignKeyAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Whether this index should be built with `CREATE INDEX CONCURRENTLY`. The differ
    /// routes these to `MigrationPlan::concurrent`; everything else stays transactional
    /// (spec.md §4.4 phase 11).
    pub concurrent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub schema: String,
    pub name: String,
    pub definition: String,
    pub materialized: bool,
    pub check_option: ViewCheckOption,
    pub security_barrier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewCheckOption {
    None,
    Local,
    Cascaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub schema: String,
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub schema: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub schema: String,
    pub object_name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub schema: String,
    pub name: String,
    pub kind: CatalogObjectKind,
    pub definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogObjectKind {
    Function,
    Procedure,
    Trigger,
}
