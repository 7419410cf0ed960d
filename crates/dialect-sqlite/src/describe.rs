use tracing::debug;

use modelql_core::{
    CancelToken, Column, Connection, DatabaseSchema, DefaultValue, Error, ForeignKey,
    ForeignKeyAction, Index, MIGRATIONS_TABLE, PrimaryKey, Table, Value,
};

const TABLE_NAMES_QUERY: &str = "\
SELECT name, sql FROM sqlite_master \
WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
ORDER BY name";

pub(crate) fn describe_schema(
    connection: &dyn Connection,
    ctx: &CancelToken,
) -> Result<DatabaseSchema, Error> {
    let mut schema = DatabaseSchema::default();

    let tables = connection.query(TABLE_NAMES_QUERY, &[], ctx)?;
    for row in tables.iter() {
        let Some(name) = row.get("name").and_then(Value::as_str) else {
            continue;
        };
        if name == MIGRATIONS_TABLE {
            continue;
        }
        let create_sql = row.get("sql").and_then(Value::as_str).unwrap_or_default();
        schema
            .tables
            .push(describe_table(connection, name, create_sql, ctx)?);
    }

    debug!(tables = schema.tables.len(), "described sqlite schema");
    Ok(schema)
}

fn describe_table(
    connection: &dyn Connection,
    table_name: &str,
    create_sql: &str,
    ctx: &CancelToken,
) -> Result<Table, Error> {
    let mut table = Table::named(table_name);
    let quoted = quote(table_name);

    let columns = connection.query(&format!("PRAGMA table_info({quoted})"), &[], ctx)?;
    let mut pk_columns = Vec::new();
    for row in columns.iter() {
        let Some(name) = row.get("name").and_then(Value::as_str) else {
            continue;
        };
        let tpe = row
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("TEXT")
            .to_string();
        let not_null = row.get("notnull").and_then(Value::as_i64).unwrap_or(0) != 0;
        let pk_position = row.get("pk").and_then(Value::as_i64).unwrap_or(0);
        let default = row
            .get("dflt_value")
            .filter(|value| !value.is_null())
            .and_then(Value::as_str)
            .map(parse_default);

        if pk_position > 0 {
            pk_columns.push((pk_position, name.to_string()));
        }

        // An INTEGER PRIMARY KEY is a rowid alias; AUTOINCREMENT only
        // shows up in the original CREATE TABLE text.
        let auto_increment = pk_position == 1
            && tpe.eq_ignore_ascii_case("INTEGER")
            && create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");

        table.columns.push(Column {
            name: name.to_string(),
            tpe,
            nullable: !not_null && pk_position == 0,
            default,
            auto_increment,
        });
    }

    if !pk_columns.is_empty() {
        pk_columns.sort();
        table.primary_key = Some(PrimaryKey {
            columns: pk_columns.into_iter().map(|(_, name)| name).collect(),
        });
    }

    let indexes = connection.query(&format!("PRAGMA index_list({quoted})"), &[], ctx)?;
    for row in indexes.iter() {
        let Some(index_name) = row.get("name").and_then(Value::as_str) else {
            continue;
        };
        // Autoindexes back primary keys and inline uniques; they have
        // no DDL of their own.
        let origin = row.get("origin").and_then(Value::as_str).unwrap_or("c");
        if origin != "c" {
            continue;
        }
        let unique = row.get("unique").and_then(Value::as_i64).unwrap_or(0) != 0;

        let index_info = connection.query(
            &format!("PRAGMA index_info({})", quote(index_name)),
            &[],
            ctx,
        )?;
        let mut columns = index_info
            .iter()
            .filter_map(|info| {
                let seqno = info.get("seqno").and_then(Value::as_i64)?;
                let column = info.get("name").and_then(Value::as_str)?;
                Some((seqno, column.to_string()))
            })
            .collect::<Vec<_>>();
        columns.sort();

        table.indexes.push(Index {
            name: index_name.to_string(),
            columns: columns.into_iter().map(|(_, name)| name).collect(),
            unique,
        });
    }

    let foreign_keys = connection.query(&format!("PRAGMA foreign_key_list({quoted})"), &[], ctx)?;
    for row in foreign_keys.iter() {
        let Some(id) = row.get("id").and_then(Value::as_i64) else {
            continue;
        };
        let referenced_table = row
            .get("table")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let from = row
            .get("from")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let to = row
            .get("to")
            .and_then(Value::as_str)
            .unwrap_or(from.as_str())
            .to_string();
        let on_delete = parse_action(row.get("on_delete").and_then(Value::as_str));
        let on_update = parse_action(row.get("on_update").and_then(Value::as_str));

        // PRAGMA rows carry no constraint names; synthesize stable
        // ones from the table and constraint ordinal.
        let name = format!("{table_name}_fk_{id}");
        match table.foreign_keys.iter_mut().find(|fk| fk.name == name) {
            Some(existing) => {
                existing.columns.push(from);
                existing.referenced_columns.push(to);
            }
            None => table.foreign_keys.push(ForeignKey {
                name,
                columns: vec![from],
                referenced_table,
                referenced_columns: vec![to],
                on_delete,
                on_update,
            }),
        }
    }

    Ok(table)
}

fn parse_default(raw: &str) -> DefaultValue {
    let trimmed = raw.trim();
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

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
