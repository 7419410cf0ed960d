use modelql_core::{SqlDialect, SqlGenError, Value};

use crate::request::{Condition, ConditionValue, JsonFilter, JsonFilterKind, json_to_value};

use super::quote_path;

/// Dialect dispatch for JSON-typed conditions: path equality,
/// containment, array membership, and key presence.
pub(crate) fn render(
    condition: &Condition,
    filter: &JsonFilter,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    let column = quote_path(dialect, &condition.field);

    match dialect {
        SqlDialect::Postgres => render_postgres(condition, filter, column, args),
        SqlDialect::Mysql => render_mysql(condition, filter, column, args),
        SqlDialect::Sqlite => render_sqlite(condition, filter, column, args),
        other => Err(SqlGenError::UnsupportedFeature {
            dialect: other.name().to_string(),
            feature: "JSON filters".to_string(),
        }),
    }
}

fn render_postgres(
    condition: &Condition,
    filter: &JsonFilter,
    column: String,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    match filter.kind {
        JsonFilterKind::Path => {
            let accessor = postgres_path_accessor(&column, &filter.path);
            push_text_arg(condition, SqlDialect::Postgres, args)?;
            Ok(format!(
                "{accessor} = {}",
                SqlDialect::Postgres.placeholder(args.len())
            ))
        }
        JsonFilterKind::Contains | JsonFilterKind::ArrayContains => {
            push_json_arg(condition, SqlDialect::Postgres, args)?;
            Ok(format!(
                "{column} @> {}",
                SqlDialect::Postgres.placeholder(args.len())
            ))
        }
        JsonFilterKind::HasKey => {
            push_text_arg(condition, SqlDialect::Postgres, args)?;
            Ok(format!(
                "{column} ? {}",
                SqlDialect::Postgres.placeholder(args.len())
            ))
        }
    }
}

/// `->` for every step but the last, `->>` for the final text read.
fn postgres_path_accessor(column: &str, path: &[String]) -> String {
    if path.is_empty() {
        return format!("{column}::text");
    }

    let mut accessor = column.to_string();
    for (index, segment) in path.iter().enumerate() {
        let arrow = if index + 1 == path.len() { "->>" } else { "->" };
        accessor.push_str(arrow);
        accessor.push_str(&format!("'{}'", segment.replace('\'', "''")));
    }
    accessor
}

fn render_mysql(
    condition: &Condition,
    filter: &JsonFilter,
    column: String,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    let path = mysql_json_path(&filter.path);

    match filter.kind {
        JsonFilterKind::Path => {
            push_text_arg(condition, SqlDialect::Mysql, args)?;
            Ok(format!(
                "JSON_UNQUOTE(JSON_EXTRACT({column}, '{path}')) = {}",
                SqlDialect::Mysql.placeholder(args.len())
            ))
        }
        JsonFilterKind::Contains | JsonFilterKind::ArrayContains => {
            push_json_arg(condition, SqlDialect::Mysql, args)?;
            Ok(format!(
                "JSON_CONTAINS({column}, {}, '{path}')",
                SqlDialect::Mysql.placeholder(args.len())
            ))
        }
        JsonFilterKind::HasKey => Ok(format!(
            "JSON_CONTAINS_PATH({column}, 'one', '{path}')",
            // key presence needs no bound value; the path carries it
        )),
    }
}

fn mysql_json_path(path: &[String]) -> String {
    let mut rendered = "$".to_string();
    for segment in path {
        rendered.push('.');
        rendered.push_str(segment);
    }
    rendered
}

fn render_sqlite(
    condition: &Condition,
    filter: &JsonFilter,
    column: String,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    let path = mysql_json_path(&filter.path);

    match filter.kind {
        JsonFilterKind::Path => {
            push_text_arg(condition, SqlDialect::Sqlite, args)?;
            Ok(format!(
                "json_extract({column}, '{path}') = {}",
                SqlDialect::Sqlite.placeholder(args.len())
            ))
        }
        JsonFilterKind::ArrayContains | JsonFilterKind::Contains => {
            push_text_arg(condition, SqlDialect::Sqlite, args)?;
            Ok(format!(
                "EXISTS (SELECT 1 FROM json_each({column}, '{path}') WHERE json_each.value = {})",
                SqlDialect::Sqlite.placeholder(args.len())
            ))
        }
        JsonFilterKind::HasKey => Ok(format!(
            "json_extract({column}, '{path}') IS NOT NULL"
        )),
    }
}

fn push_text_arg(
    condition: &Condition,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<(), SqlGenError> {
    let ConditionValue::Literal(raw) = &condition.value else {
        return Err(missing_value(dialect, condition));
    };
    args.push(json_to_value(raw));
    Ok(())
}

/// Containment compares whole documents; ship the literal as JSON text.
fn push_json_arg(
    condition: &Condition,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<(), SqlGenError> {
    let ConditionValue::Literal(raw) = &condition.value else {
        return Err(missing_value(dialect, condition));
    };
    args.push(Value::Text(raw.to_string()));
    Ok(())
}

fn missing_value(dialect: SqlDialect, condition: &Condition) -> SqlGenError {
    SqlGenError::UnsupportedFeature {
        dialect: dialect.name().to_string(),
        feature: format!("JSON filter on `{}` without a literal value", condition.field),
    }
}
