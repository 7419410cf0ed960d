use std::collections::BTreeMap;

use tracing::debug;

use modelql_core::{
    CancelToken, Column, Connection, DatabaseSchema, DefaultValue, Error, ForeignKey,
    ForeignKeyAction, Index, MIGRATIONS_TABLE, PrimaryKey, Table, Value,
};

use crate::export_queries;

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
        if name == MIGRATIONS_TABLE {
            continue;
        }
        schema.tables.push(describe_table(connection, name, ctx)?);
    }

    debug!(tables = schema.tables.len(), "described mysql schema");
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
        let tpe = row
            .get("column_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let nullable = row.get("is_nullable").and_then(Value::as_str) == Some("YES");
        let extra = row
            .get("extra")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        let auto_increment = extra.contains("auto_increment");
        let default = row
            .get("column_default")
            .filter(|value| !value.is_null())
            .and_then(Value::as_str)
            .map(parse_default);

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
        let unique = row.get("non_unique").and_then(Value::as_i64) == Some(0);
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

fn parse_default(raw: &str) -> DefaultValue {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("CURRENT_TIMESTAMP")
        || trimmed.to_ascii_lowercase().starts_with("current_timestamp(")
    {
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
