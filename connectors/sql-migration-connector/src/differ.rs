//! Differ (C4). `diff(desired, current)` is a pure function: no I/O, no side effects,
//! deterministic statement ordering given the same two snapshots (spec.md §4.4).

use std::collections::{HashSet, VecDeque};

use migration_connector::{Capabilities, Capability, DependencyError, MigrationPlan, ValidationError};
use sql_schema_describer::{normalize, Column, EnumType, ForeignKey, SqlSchema, Table, View};
use thiserror::Error;

use crate::emitter;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub fn diff(desired: &SqlSchema, current: &SqlSchema, capabilities: Capabilities) -> Result<MigrationPlan, DiffError> {
    let mut plan = MigrationPlan::default();

    phase1_schemas(desired, current, capabilities, &mut plan);
    phase2_extensions(desired, current, &mut plan);
    phase3_enums(desired, current, capabilities, &mut plan)?;
    let recreated_views = phase4_drop_recreated_views(desired, current, &mut plan);
    phase5_drop_blocking_foreign_keys(desired, current, capabilities, &mut plan);
    let (new_tables, cyclic_fks) = phase6_create_tables(desired, current, &mut plan)?;
    phase7_alter_existing_tables(desired, current, capabilities, &mut plan);
    phase8_add_constraints(desired, current, &new_tables, &cyclic_fks, &mut plan);
    phase9_create_views(desired, current, &recreated_views, &mut plan);
    phase10_drop_tables(desired, current, &mut plan);
    phase11_indexes(desired, current, capabilities, &mut plan);

    Ok(plan)
}

fn sorted_by_schema_name<'a, T>(items: impl Iterator<Item = &'a T>, key: impl Fn(&'a T) -> (&'a str, &'a str)) -> Vec<&'a T> {
    let mut items: Vec<&T> = items.collect();
    items.sort_by(|a, b| key(a).cmp(&key(b)));
    items
}

fn phase1_schemas(desired: &SqlSchema, current: &SqlSchema, capabilities: Capabilities, plan: &mut MigrationPlan) {
    if !capabilities.contains(Capability::Schemas) {
        return;
    }
    let mut missing: Vec<&String> = desired.schemas.iter().filter(|s| !current.schemas.contains(s)).collect();
    missing.sort();
    for schema in missing {
        let stmt = emitter::create_schema(schema);
        plan.push_transactional(stmt.sql);
    }
}

fn phase2_extensions(desired: &SqlSchema, current: &SqlSchema, plan: &mut MigrationPlan) {
    let mut missing: Vec<&String> = desired.extensions.iter().filter(|e| !current.extensions.contains(e)).collect();
    missing.sort();
    for extension in missing {
        plan.push_transactional(emitter::create_extension(extension).sql);
    }
}

fn phase3_enums(
    desired: &SqlSchema,
    current: &SqlSchema,
    capabilities: Capabilities,
    plan: &mut MigrationPlan,
) -> Result<(), ValidationError> {
    if !capabilities.contains(Capability::Enums) {
        return Ok(());
    }

    let enums = sorted_by_schema_name(desired.enums.iter(), |e: &EnumType| (e.schema.as_str(), e.name.as_str()));
    for enum_type in enums {
        match current.enum_type(&enum_type.schema, &enum_type.name) {
            None => {
                plan.push_transactional(emitter::create_enum(&enum_type.schema, &enum_type.name, &enum_type.values).sql);
            }
            Some(current_enum) => {
                if current_enum.values == enum_type.values {
                    continue;
                }
                let shares_prefix = enum_type.values.len() >= current_enum.values.len()
                    && enum_type.values[..current_enum.values.len()] == current_enum.values[..];
                if !shares_prefix {
                    let removed = current_enum.values.iter().find(|v| !enum_type.values.contains(v));
                    if let Some(value) = removed {
                        return Err(ValidationError::EnumValueRemoved {
                            schema: enum_type.schema.clone(),
                            name: enum_type.name.clone(),
                            value: value.clone(),
                        });
                    }
                    return Err(ValidationError::EnumValuesReordered {
                        schema: enum_type.schema.clone(),
                        name: enum_type.name.clone(),
                    });
                }
                for new_value in &enum_type.values[current_enum.values.len()..] {
                    plan.push_transactional(emitter::alter_type_add_value(&enum_type.schema, &enum_type.name, new_value).sql);
                }
            }
        }
    }
    Ok(())
}

/// Views that existed in `current` and either vanished from `desired`, changed shape, or read
/// from a table phase 7 is about to alter. The last case is conservative by design (spec.md
/// §4.4 phase 4, §9): Postgres refuses to `ALTER COLUMN ... TYPE` a column a view depends on,
/// so any view touching an altered table is dropped now and recreated (if still desired) in
/// phase 9, whether or not the view's own definition changed.
fn phase4_drop_recreated_views(desired: &SqlSchema, current: &SqlSchema, plan: &mut MigrationPlan) -> HashSet<(String, String)> {
    let altered = tables_with_alterations(desired, current);
    let mut recreated = HashSet::new();
    let views = sorted_by_schema_name(current.views.iter(), |v: &View| (v.schema.as_str(), v.name.as_str()));
    for view in views {
        let depends_on_altered_table = altered.iter().any(|(_, table_name)| view_references_table(view, table_name));
        match desired.view(&view.schema, &view.name) {
            Some(desired_view) if desired_view == view && !depends_on_altered_table => {}
            Some(_) => {
                plan.push_transactional(emitter::drop_view(view).sql);
                recreated.insert((view.schema.clone(), view.name.clone()));
            }
            None => {
                plan.push_transactional(emitter::drop_view(view).sql);
            }
        }
    }
    recreated
}

/// Tables present on both sides whose column shape differs: added, dropped, or changed
/// columns. Computed independently of phase 7 so phase 4 (which runs first) can know which
/// views to drop before any `ALTER TABLE` is emitted.
fn tables_with_alterations(desired: &SqlSchema, current: &SqlSchema) -> HashSet<(String, String)> {
    let mut altered = HashSet::new();
    for current_table in &current.tables {
        let Some(desired_table) = desired.table(&current_table.schema, &current_table.name) else { continue };

        let added_or_changed = desired_table.columns.iter().any(|column| match current_table.column(&column.name) {
            Some(current_column) => !columns_equal(current_column, column),
            None => true,
        });
        let dropped = current_table.columns.iter().any(|column| desired_table.column(&column.name).is_none());

        if added_or_changed || dropped {
            altered.insert((current_table.schema.clone(), current_table.name.clone()));
        }
    }
    altered
}

/// Naive, conservative text-based dependency check: does `view`'s captured body mention
/// `table_name` as a standalone token (quoted or bare)? No view in this object model carries
/// a structured table-reference list (spec.md §3's `View` shape is just the body text), so
/// this is the same kind of best-effort textual scan a hand-rolled dependency tracker would
/// do rather than a real SQL-aware reference resolver; false positives only cause an
/// unnecessary drop-and-recreate, never a missed one.
fn view_references_table(view: &View, table_name: &str) -> bool {
    let needle = table_name.to_lowercase();
    view.definition
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| token.to_lowercase() == needle)
}

/// Drops any current foreign key whose columns include one whose type is about to change,
/// so the subsequent `ALTER COLUMN ... TYPE` does not fail against a live constraint. Such
/// FKs are re-added in phase 8 if `desired` still wants them.
///
/// Dialects without `Capability::AlterColumnType` never reach an `ALTER COLUMN TYPE` for this
/// case (phase 7 rebuilds the whole table instead, which drops and recreates the FK along with
/// everything else), and SQLite has no `ALTER TABLE ... DROP CONSTRAINT` to emit here anyway.
fn phase5_drop_blocking_foreign_keys(desired: &SqlSchema, current: &SqlSchema, capabilities: Capabilities, plan: &mut MigrationPlan) {
    if !capabilities.contains(Capability::AlterColumnType) {
        return;
    }
    let tables = sorted_by_schema_name(current.tables.iter(), |t: &Table| (t.schema.as_str(), t.name.as_str()));
    for table in tables {
        let Some(desired_table) = desired.table(&table.schema, &table.name) else { continue };
        let changing_columns: HashSet<&str> = table
            .columns
            .iter()
            .filter_map(|column| {
                let desired_column = desired_table.column(&column.name)?;
                let type_changed = normalize::canonical_type(&column.tpe.full_data_type)
                    != normalize::canonical_type(&desired_column.tpe.full_data_type);
                type_changed.then_some(column.name.as_str())
            })
            .collect();

        if changing_columns.is_empty() {
            continue;
        }

        for fk in &table.foreign_keys {
            if fk.columns.iter().any(|c| changing_columns.contains(c.as_str())) {
                plan.push_transactional(emitter::drop_foreign_key(table, fk).sql);
            }
        }
    }
}

type CyclicForeignKeys = std::collections::HashMap<(String, String), Vec<Vec<String>>>;

fn phase6_create_tables(
    desired: &SqlSchema,
    current: &SqlSchema,
    plan: &mut MigrationPlan,
) -> Result<(HashSet<(String, String)>, CyclicForeignKeys), DependencyError> {
    let new_tables: Vec<&Table> = desired.tables.iter().filter(|t| current.table(&t.schema, &t.name).is_none()).collect();
    let new_table_keys: HashSet<(String, String)> = new_tables.iter().map(|t| (t.schema.clone(), t.name.clone())).collect();

    for table in &new_tables {
        for fk in &table.foreign_keys {
            let referenced_exists = desired.table(&fk.referenced_schema, &fk.referenced_table).is_some()
                || current.table(&fk.referenced_schema, &fk.referenced_table).is_some();
            if !referenced_exists {
                return Err(DependencyError::MissingReferencedTable {
                    schema: table.schema.clone(),
                    table: table.name.clone(),
                    referenced_schema: fk.referenced_schema.clone(),
                    referenced_table: fk.referenced_table.clone(),
                });
            }
        }
    }

    let (ordered, cyclic_fk_owners) = topological_order(&new_tables, &new_table_keys)?;

    for key in &ordered {
        let table = new_tables.iter().find(|t| (&t.schema, &t.name) == (&key.0, &key.1)).unwrap();
        let skip_columns = cyclic_fk_owners.get(key).cloned().unwrap_or_default();
        if skip_columns.is_empty() {
            plan.push_transactional(emitter::create_table(table).sql);
        } else {
            let mut without_cyclic_fks = (*table).clone();
            without_cyclic_fks.foreign_keys.retain(|fk| !skip_columns.contains(&fk.columns));
            plan.push_transactional(emitter::create_table(&without_cyclic_fks).sql);
        }
    }

    Ok((new_table_keys, cyclic_fk_owners))
}

fn table_has_type_change(desired: &Table, current: &Table) -> bool {
    desired.columns.iter().any(|column| {
        current
            .column(&column.name)
            .map(|current_column| {
                normalize::canonical_type(&current_column.tpe.full_data_type) != normalize::canonical_type(&column.tpe.full_data_type)
            })
            .unwrap_or(false)
    })
}

/// Kahn's algorithm over the new tables' foreign-key edges. Edges that would close a cycle
/// are recorded (by owning table + FK column list) rather than followed, so the caller can
/// omit them from `CREATE TABLE` and add them back in phase 8.
fn topological_order(
    tables: &[&Table],
    in_scope: &HashSet<(String, String)>,
) -> Result<(Vec<(String, String)>, std::collections::HashMap<(String, String), Vec<Vec<String>>>), DependencyError> {
    let mut in_degree: std::collections::HashMap<(String, String), usize> = std::collections::HashMap::new();
    let mut dependents: std::collections::HashMap<(String, String), Vec<(String, String)>> = std::collections::HashMap::new();
    let mut deferred: std::collections::HashMap<(String, String), Vec<Vec<String>>> = std::collections::HashMap::new();

    for table in tables {
        let key = (table.schema.clone(), table.name.clone());
        in_degree.entry(key.clone()).or_insert(0);
        for fk in &table.foreign_keys {
            let dep_key = (fk.referenced_schema.clone(), fk.referenced_table.clone());
            if !in_scope.contains(&dep_key) || dep_key == key {
                continue;
            }
            *in_degree.entry(key.clone()).or_insert(0) += 1;
            dependents.entry(dep_key).or_default().push(key.clone());
        }
    }

    let mut queue: VecDeque<(String, String)> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(k, _)| k.clone()).collect();
    queue.make_contiguous().sort();
    let mut ordered = Vec::new();

    while let Some(key) = queue.pop_front() {
        ordered.push(key.clone());
        if let Some(deps) = dependents.get(&key) {
            let mut freed = Vec::new();
            for dep in deps {
                let degree = in_degree.get_mut(dep).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    freed.push(dep.clone());
                }
            }
            freed.sort();
            for f in freed {
                queue.push_back(f);
            }
        }
    }

    if ordered.len() < tables.len() {
        let remaining: Vec<(String, String)> =
            tables.iter().map(|t| (t.schema.clone(), t.name.clone())).filter(|k| !ordered.contains(k)).collect();
        for key in &remaining {
            let table = tables.iter().find(|t| (&t.schema, &t.name) == (&key.0, &key.1)).unwrap();
            let cyclic_fks: Vec<Vec<String>> = table
                .foreign_keys
                .iter()
                .filter(|fk| in_scope.contains(&(fk.referenced_schema.clone(), fk.referenced_table.clone())))
                .map(|fk| fk.columns.clone())
                .collect();
            deferred.insert(key.clone(), cyclic_fks);
        }
        let mut remaining_sorted = remaining;
        remaining_sorted.sort();
        ordered.extend(remaining_sorted);
    }

    Ok((ordered, deferred))
}

fn phase7_alter_existing_tables(desired: &SqlSchema, current: &SqlSchema, capabilities: Capabilities, plan: &mut MigrationPlan) {
    let tables = sorted_by_schema_name(desired.tables.iter(), |t: &Table| (t.schema.as_str(), t.name.as_str()));
    for table in tables {
        let Some(current_table) = current.table(&table.schema, &table.name) else { continue };

        // Dialects without AlterColumnType (SQLite) can't express a type change as an
        // ALTER COLUMN; the whole table is rebuilt under a scratch name instead, which also
        // picks up any column add/drop in the same pass (spec.md §9 design notes).
        if !capabilities.contains(Capability::AlterColumnType) && table_has_type_change(table, current_table) {
            for statement in emitter::rebuild_table_for_type_change(table, current_table) {
                plan.push_transactional(statement.sql);
            }
            continue;
        }

        for column in &table.columns {
            if current_table.column(&column.name).is_none() {
                plan.push_transactional(emitter::add_column(table, column).sql);
            }
        }

        for column in &current_table.columns {
            if table.column(&column.name).is_none() {
                plan.push_transactional(emitter::drop_column(table, &column.name).sql);
            }
        }

        for column in &table.columns {
            let Some(current_column) = current_table.column(&column.name) else { continue };
            if !columns_equal(current_column, column) {
                emit_column_alteration(table, current_column, column, plan);
            }
        }
    }
}

/// `SERIAL`'s owned-sequence default (`nextval('tbl_col_seq'::regclass)`) is an artifact of
/// the database expanding the `SERIAL` sugar, not something the author wrote; a desired-state
/// column declared `SERIAL` never carries an explicit default, so comparing it byte-for-byte
/// against a live column's `nextval(...)` would re-emit a spurious `SET DEFAULT`/`DROP DEFAULT`
/// pair on every run (breaking the idempotence property spec.md §8 names first).
fn defaults_comparable(a: &Column, b: &Column) -> bool {
    !(normalize::is_serial_alias(&a.tpe.full_data_type) || normalize::is_serial_alias(&b.tpe.full_data_type))
}

fn columns_equal(a: &Column, b: &Column) -> bool {
    normalize::canonical_type(&a.tpe.full_data_type) == normalize::canonical_type(&b.tpe.full_data_type)
        && a.nullable == b.nullable
        && (!defaults_comparable(a, b)
            || normalize::canonical_default(a.default.as_ref().map(|d| d.0.as_str()))
                == normalize::canonical_default(b.default.as_ref().map(|d| d.0.as_str())))
}

/// spec.md §4.4.1: DROP DEFAULT, ALTER COLUMN TYPE, SET DEFAULT, then SET/DROP NOT NULL.
fn emit_column_alteration(table: &Table, current: &Column, desired: &Column, plan: &mut MigrationPlan) {
    let type_changing = normalize::canonical_type(&current.tpe.full_data_type) != normalize::canonical_type(&desired.tpe.full_data_type);

    if type_changing && current.default.is_some() {
        plan.push_transactional(emitter::drop_default(table, &current.name).sql);
    }

    if type_changing {
        plan.push_transactional(emitter::alter_column_type(table, desired, &desired.tpe.full_data_type).sql);
    }

    if defaults_comparable(current, desired) {
        let current_default_after_cast = if type_changing { None } else { current.default.as_ref().map(|d| d.0.as_str()) };
        let canonical_current_default = normalize::canonical_default(current_default_after_cast);
        let canonical_desired_default = normalize::canonical_default(desired.default.as_ref().map(|d| d.0.as_str()));
        if canonical_current_default != canonical_desired_default {
            match &desired.default {
                Some(default) => plan.push_transactional(emitter::set_default(table, &desired.name, &default.0).sql),
                None => plan.push_transactional(emitter::drop_default(table, &desired.name).sql),
            }
        }
    }

    if current.nullable != desired.nullable {
        plan.push_transactional(emitter::set_not_null(table, &desired.name, !desired.nullable).sql);
    }
}

fn phase8_add_constraints(
    desired: &SqlSchema,
    current: &SqlSchema,
    new_tables: &HashSet<(String, String)>,
    cyclic_fks: &CyclicForeignKeys,
    plan: &mut MigrationPlan,
) {
    let tables = sorted_by_schema_name(desired.tables.iter(), |t: &Table| (t.schema.as_str(), t.name.as_str()));
    for table in tables {
        let key = (table.schema.clone(), table.name.clone());
        if new_tables.contains(&key) {
            continue;
        }
        let current_table = current.table(&table.schema, &table.name);

        for fk in &table.foreign_keys {
            let already_present = current_table.map(|t| t.foreign_keys.iter().any(|f| f.columns == fk.columns)).unwrap_or(false);
            if !already_present {
                plan.push_transactional(emitter::add_foreign_key(table, fk).sql);
            }
        }

        for unique in &table.uniques {
            let already_present = current_table.map(|t| t.uniques.iter().any(|u| u.columns == unique.columns)).unwrap_or(false);
            if !already_present {
                plan.push_transactional(emitter::add_unique(table, unique).sql);
            }
        }

        for check in &table.checks {
            let already_present = current_table.map(|t| t.checks.iter().any(|c| c.expression == check.expression)).unwrap_or(false);
            if !already_present {
                plan.push_transactional(emitter::add_check(table, check).sql);
            }
        }
    }

    // Ordinary foreign keys on new tables were already emitted inline by `CREATE TABLE` in
    // phase 6; only the cyclic ones phase 6 stripped out are added here.
    for (key, skip_columns) in cyclic_fks {
        let Some(table) = desired.table(&key.0, &key.1) else { continue };
        for fk in table.foreign_keys.iter().filter(|fk| skip_columns.contains(&fk.columns)) {
            plan.push_transactional(emitter::add_foreign_key(table, fk).sql);
        }
    }
}

fn phase9_create_views(desired: &SqlSchema, current: &SqlSchema, recreated: &HashSet<(String, String)>, plan: &mut MigrationPlan) {
    let views = sorted_by_schema_name(desired.views.iter(), |v: &View| (v.schema.as_str(), v.name.as_str()));
    for view in views {
        let key = (view.schema.clone(), view.name.clone());
        let is_new = current.view(&view.schema, &view.name).is_none();
        if is_new || recreated.contains(&key) {
            plan.push_transactional(emitter::create_view(view).sql);
        }
    }
}

fn phase10_drop_tables(desired: &SqlSchema, current: &SqlSchema, plan: &mut MigrationPlan) {
    let tables = sorted_by_schema_name(current.tables.iter(), |t: &Table| (t.schema.as_str(), t.name.as_str()));
    for table in tables {
        if desired.table(&table.schema, &table.name).is_none() {
            plan.push_transactional(emitter::drop_table_cascade(table).sql);
        }
    }
}

fn phase11_indexes(desired: &SqlSchema, current: &SqlSchema, capabilities: Capabilities, plan: &mut MigrationPlan) {
    let tables = sorted_by_schema_name(desired.tables.iter(), |t: &Table| (t.schema.as_str(), t.name.as_str()));
    for table in tables {
        let current_table = current.table(&table.schema, &table.name);
        for index in &table.indexes {
            let already_present = current_table.map(|t| t.indexes.iter().any(|i| i.name == index.name)).unwrap_or(false);
            if already_present {
                continue;
            }
            let statement = emitter::create_index(&table.schema, index);
            if index.concurrent && capabilities.contains(Capability::ConcurrentIndex) {
                plan.push_concurrent(statement.sql);
            } else {
                plan.push_transactional(statement.sql);
            }
        }
        if let Some(current_table) = current_table {
            for index in &current_table.indexes {
                if !table.indexes.iter().any(|i| i.name == index.name) {
                    let statement = emitter::drop_index(&table.schema, index);
                    if index.concurrent && capabilities.contains(Capability::ConcurrentIndex) {
                        plan.push_concurrent(statement.sql);
                    } else {
                        plan.push_transactional(statement.sql);
                    }
                }
            }
        }
    }
}
