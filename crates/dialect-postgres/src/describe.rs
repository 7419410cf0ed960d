use std::collections::BTreeMap;

use tracing::debug;

use modelql_core::{
    CancelToken, Column, Connection, DatabaseSchema, DefaultValue, Error, ForeignKey,
    ForeignKeyAction, Index, MIGRATIONS_TABLE, PrimaryKey, Table, Value,
};

use crate::export_queries;

/// Reads the live catalog into the canonical schema. The migration
/// ledger and PostGIS bookkeeping are excluded, matching what the diff
/// flavour ignores.
pub(crate) fn describe_schema(
    connection: &dyn Connection,
    ctx: &CancelToken,
) -> Result<DatabaseSchema, Error> {
    let mut schema = DatabaseSchema::default();

    let tables = connection.query(export_queries::TABLE_NAMES_QUERY, &[], ctx)?;
    for row in tables.iter() {
        let Some(name) = row.get("table_name").and_then(Value::as_str) else {
            continue;
        };
        if name == MIGRATIONS_TABLE || name == "spatial_ref_sys" {
            continue;
        }
        schema.tables.push(describe_table(connection, name, ctx)?);
    }

    debug!(tables = schema.tables.len(), "described postgres schema");
    Ok(schema)
}

fn describe_table(
    connection: &dyn Connection,
    table_name: &str,
    ctx: &CancelToken,
) -> Result<Table, Error> {
    let name_arg = [Value::text(table_name)];
    let mut table = Table::named(table_name);

    let columns = connection.query(export_queries::TABLE_COLUMNS_QUERY, &name_arg, ctx)?;
    for row in columns.iter() {
        let Some(column_name) = row.get("column_name").and_then(Value::as_str) else {
            continue;
        };
        let data_type = row
            .get("data_type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // `USER-DEFINED` and `ARRAY` carry the real name in udt_name.
        let tpe = match data_type {
            "USER-DEFINED" | "ARRAY" | "" => row
                .get("udt_name")
                .and_then(Value::as_str)
                .unwrap_or(data_type)
                .to_string(),
            concrete => concrete.to_string(),
        };
        let nullable = row.get("is_nullable").and_then(Value::as_str) == Some("YES");
        let raw_default = row.get("column_default").and_then(Value::as_str);

        let auto_increment = raw_default.is_some_and(|raw| raw.starts_with("nextval("));
        let default = if auto_increment {
            None
        } else {
            raw_default.map(parse_default)
        };

        table.columns.push(Column {
            name: column_name.to_string(),
            tpe,
            nullable,
            default,
            auto_increment,
        });
    }

    let primary_key = connection.query(export_queries::PRIMARY_KEY_QUERY, &name_arg, ctx)?;
    let pk_columns = primary_key
        .iter()
        .filter_map(|row| row.get("column_name").and_then(Value::as_str))
        .map(str::to_string)
        .collect::<Vec<_>>();
    if !pk_columns.is_empty() {
        table.primary_key = Some(PrimaryKey { columns: pk_columns });
    }

    let indexes = connection.query(export_queries::INDEXES_QUERY, &name_arg, ctx)?;
    let mut indexes_by_name = BTreeMap::<String, Index>::new();
    for row in indexes.iter() {
        let Some(index_name) = row.get("index_name").and_then(Value::as_str) else {
            continue;
        };
        let Some(column_name) = row.get("column_name").and_then(Value::as_str) else {
            continue;
        };
        let unique = row.get("is_unique").and_then(Value::as_bool).unwrap_or(false);
        indexes_by_name
            .entry(index_name.to_string())
            .or_insert_with(|| Index {
                name: index_name.to_string(),
                columns: Vec::new(),
                unique,
            })
            .columns
            .push(column_name.to_string());
    }
    table.indexes = indexes_by_name.into_values().collect();

    let foreign_keys = connection.query(export_queries::FOREIGN_KEYS_QUERY, &name_arg, ctx)?;
    let mut fks_by_name = BTreeMap::<String, ForeignKey>::new();
    for row in foreign_keys.iter() {
        let Some(constraint) = row.get("constraint_name").and_then(Value::as_str) else {
            continue;
        };
        let column = row
            .get("column_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let referenced_table = row
            .get("referenced_table")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let referenced_column = row
            .get("referenced_column")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let on_delete = parse_action(row.get("delete_rule").and_then(Value::as_str));
        let on_update = parse_action(row.get("update_rule").and_then(Value::as_str));

        let entry = fks_by_name
            .entry(constraint.to_string())
            .or_insert_with(|| ForeignKey {
                name: constraint.to_string(),
                columns: Vec::new(),
                referenced_table,
                referenced_columns: Vec::new(),
                on_delete,
                on_update,
            });
        entry.columns.push(column);
        entry.referenced_columns.push(referenced_column);
    }
    table.foreign_keys = fks_by_name.into_values().collect();

    Ok(table)
}

/// `'active'::text` style defaults lose their cast; function calls
/// keep their name.
fn parse_default(raw: &str) -> DefaultValue {
    let trimmed = raw.split("::").next().unwrap_or(raw).trim();

    if let Some(open) = trimmed.find('(')
        && trimmed.ends_with(')')
        && trimmed[..open].chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        let name = &trimmed[..open];
        let inner = &trimmed[open + 1..trimmed.len() - 1];
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|arg| arg.trim().to_string()).collect()
        };
        return DefaultValue::Function {
            name: name.to_string(),
            args,
        };
    }

    if trimmed.eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
        return DefaultValue::function("CURRENT_TIMESTAMP");
    }

    DefaultValue::literal(trimmed)
}

fn parse_action(raw: Option<&str>) -> ForeignKeyAction {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("CASCADE") => ForeignKeyAction::Cascade,
        Some("RESTRICT") => ForeignKeyAction::Restrict,
        Some("SET NULL") => ForeignKeyAction::SetNull,
        Some("SET DEFAULT") => ForeignKeyAction::SetDefault,
        _ => ForeignKeyAction::NoAction,
    }
}
