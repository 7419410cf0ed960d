use std::collections::BTreeMap;
use std::fmt::Write as _;

use modelql_core::{SqlDialect, SqlGenError, Value};

use crate::request::WhereNode;

use super::{SqlQuery, render_where};

/// INSERT one row. On dialects with a return channel the inserted row
/// comes back directly (`RETURNING *` / `OUTPUT INSERTED.*`); the
/// others re-select by last-insert-id, which the executor handles.
pub fn insert(
    table: &str,
    data: &BTreeMap<String, Value>,
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if data.is_empty() {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: format!("inserting an empty row into `{table}`"),
        });
    }

    let mut args = Vec::with_capacity(data.len());
    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());

    for (column, value) in data {
        columns.push(dialect.quote_ident(column));
        args.push(value.clone());
        placeholders.push(dialect.placeholder(args.len()));
    }

    let table_sql = dialect.quote_ident(table);
    let sql = match dialect {
        SqlDialect::Postgres => format!(
            "INSERT INTO {table_sql} ({}) VALUES ({}) RETURNING *",
            columns.join(", "),
            placeholders.join(", ")
        ),
        SqlDialect::Mssql => format!(
            "INSERT INTO {table_sql} ({}) OUTPUT INSERTED.* VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ),
        _ => format!(
            "INSERT INTO {table_sql} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ),
    };

    Ok(SqlQuery::new(sql, args))
}

/// Insert-or-update keyed on `conflict_target`. Every column of a
/// composite target participates; both the conflict clause and any
/// re-select after the write bind the full target.
pub fn upsert(
    table: &str,
    data: &BTreeMap<String, Value>,
    conflict_target: &[String],
    update_columns: &[String],
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if conflict_target.is_empty() {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: format!("upsert into `{table}` without a conflict target"),
        });
    }

    match dialect {
        SqlDialect::Postgres | SqlDialect::Sqlite => {
            on_conflict_upsert(table, data, conflict_target, update_columns, dialect)
        }
        SqlDialect::Mysql => duplicate_key_upsert(table, data, update_columns, dialect),
        SqlDialect::Mssql => merge_upsert(table, data, conflict_target, update_columns, dialect),
        SqlDialect::Mongodb => Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: "SQL upsert (use mongo_upsert)".to_string(),
        }),
    }
}

fn on_conflict_upsert(
    table: &str,
    data: &BTreeMap<String, Value>,
    conflict_target: &[String],
    update_columns: &[String],
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    let base = insert_without_returning(table, data, dialect)?;
    let mut sql = base.sql;

    let target = conflict_target
        .iter()
        .map(|column| dialect.quote_ident(column))
        .collect::<Vec<_>>();
    write!(sql, " ON CONFLICT ({})", target.join(", ")).expect("writing to String should not fail");

    if update_columns.is_empty() {
        sql.push_str(" DO NOTHING");
    } else {
        let assignments = update_columns
            .iter()
            .map(|column| {
                let quoted = dialect.quote_ident(column);
                format!("{quoted} = EXCLUDED.{quoted}")
            })
            .collect::<Vec<_>>();
        write!(sql, " DO UPDATE SET {}", assignments.join(", "))
            .expect("writing to String should not fail");
    }

    if dialect == SqlDialect::Postgres {
        sql.push_str(" RETURNING *");
    }

    Ok(SqlQuery::new(sql, base.args))
}

fn duplicate_key_upsert(
    table: &str,
    data: &BTreeMap<String, Value>,
    update_columns: &[String],
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    let base = insert_without_returning(table, data, dialect)?;
    let mut sql = base.sql;

    let assignments = if update_columns.is_empty() {
        // No-op assignment keeps the statement an upsert without
        // changing the matched row.
        let first = data.keys().next().expect("insert data is non-empty");
        let quoted = dialect.quote_ident(first);
        vec![format!("{quoted} = {quoted}")]
    } else {
        update_columns
            .iter()
            .map(|column| {
                let quoted = dialect.quote_ident(column);
                format!("{quoted} = VALUES({quoted})")
            })
            .collect()
    };
    write!(sql, " ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
        .expect("writing to String should not fail");

    Ok(SqlQuery::new(sql, base.args))
}

fn merge_upsert(
    table: &str,
    data: &BTreeMap<String, Value>,
    conflict_target: &[String],
    update_columns: &[String],
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    let mut args = Vec::with_capacity(data.len());
    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    for (column, value) in data {
        columns.push(dialect.quote_ident(column));
        args.push(value.clone());
        placeholders.push(dialect.placeholder(args.len()));
    }

    let table_sql = dialect.quote_ident(table);
    let on = conflict_target
        .iter()
        .map(|column| {
            let quoted = dialect.quote_ident(column);
            format!("target.{quoted} = source.{quoted}")
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut sql = format!(
        "MERGE INTO {table_sql} AS target USING (VALUES ({})) AS source ({}) ON {on}",
        placeholders.join(", "),
        columns.join(", ")
    );

    if !update_columns.is_empty() {
        let assignments = update_columns
            .iter()
            .map(|column| {
                let quoted = dialect.quote_ident(column);
                format!("target.{quoted} = source.{quoted}")
            })
            .collect::<Vec<_>>();
        write!(sql, " WHEN MATCHED THEN UPDATE SET {}", assignments.join(", "))
            .expect("writing to String should not fail");
    }

    write!(
        sql,
        " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({}) OUTPUT INSERTED.*;",
        columns.join(", "),
        columns
            .iter()
            .map(|column| format!("source.{column}"))
            .collect::<Vec<_>>()
            .join(", ")
    )
    .expect("writing to String should not fail");

    Ok(SqlQuery::new(sql, args))
}

fn insert_without_returning(
    table: &str,
    data: &BTreeMap<String, Value>,
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if data.is_empty() {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: format!("inserting an empty row into `{table}`"),
        });
    }

    let mut args = Vec::with_capacity(data.len());
    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    for (column, value) in data {
        columns.push(dialect.quote_ident(column));
        args.push(value.clone());
        placeholders.push(dialect.placeholder(args.len()));
    }

    Ok(SqlQuery::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        args,
    ))
}

/// UPDATE always carries a predicate: a request without one gets the
/// `WHERE 1=0` guard instead of a full-table rewrite.
pub fn update(
    table: &str,
    data: &BTreeMap<String, Value>,
    filter: Option<&WhereNode>,
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if data.is_empty() {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: format!("updating `{table}` with no assignments"),
        });
    }

    let mut args = Vec::with_capacity(data.len());
    let mut assignments = Vec::with_capacity(data.len());
    for (column, value) in data {
        args.push(value.clone());
        assignments.push(format!(
            "{} = {}",
            dialect.quote_ident(column),
            dialect.placeholder(args.len())
        ));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_ident(table),
        assignments.join(", ")
    );

    match filter.filter(|filter| !filter.is_empty()) {
        Some(filter) => {
            let rendered = render_where(filter, dialect, &mut args)?;
            write!(sql, " WHERE {rendered}").expect("writing to String should not fail");
        }
        None => sql.push_str(" WHERE 1=0"),
    }

    Ok(SqlQuery::new(sql, args))
}

/// DELETE always carries a predicate: a request without one gets the
/// `WHERE 1=0` guard instead of a full-table delete.
pub fn delete(
    table: &str,
    filter: Option<&WhereNode>,
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    let mut args = Vec::new();
    let mut sql = format!("DELETE FROM {}", dialect.quote_ident(table));

    match filter.filter(|filter| !filter.is_empty()) {
        Some(filter) => {
            let rendered = render_where(filter, dialect, &mut args)?;
            write!(sql, " WHERE {rendered}").expect("writing to String should not fail");
        }
        None => sql.push_str(" WHERE 1=0"),
    }

    Ok(SqlQuery::new(sql, args))
}
