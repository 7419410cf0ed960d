mod json_filter;
mod mongo;
mod select;
mod where_clause;
mod write;

pub use mongo::{MongoCommand, mongo_delete, mongo_find, mongo_insert, mongo_upsert};
pub use select::{
    Aggregate, AggregateFunc, Aggregation, CommonTableExpression, Join, JoinKind, WindowFunction,
    aggregate, select, select_with_cte, select_with_joins, select_with_windows,
};
pub use where_clause::render_where;
pub use write::{delete, insert, update, upsert};

use modelql_core::{SqlDialect, Value};

/// A rendered statement plus its bound arguments, placeholder style
/// already matching the dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Window functions arrived in MySQL 8.0 and SQLite 3.25; everything
/// else in the matrix always has them.
#[must_use]
pub fn supports_window_functions(dialect: SqlDialect, major: u32, minor: u32) -> bool {
    match dialect {
        SqlDialect::Mysql => major >= 8,
        SqlDialect::Sqlite => (major, minor) >= (3, 25),
        SqlDialect::Postgres | SqlDialect::Mssql => true,
        SqlDialect::Mongodb => false,
    }
}

/// Quotes a possibly qualified identifier: `posts.id` becomes
/// `"posts"."id"`.
pub(crate) fn quote_path(dialect: SqlDialect, path: &str) -> String {
    path.split('.')
        .map(|part| dialect.quote_ident(part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Re-numbers numbered placeholders in a spliced SQL fragment so its
/// arguments land after `offset` already-bound ones. `?`-style dialects
/// need no shifting.
pub(crate) fn shift_placeholders(sql: &str, dialect: SqlDialect, offset: usize) -> String {
    let marker = match dialect {
        SqlDialect::Postgres => '$',
        SqlDialect::Mssql => '@',
        _ => return sql.to_string(),
    };

    let mut shifted = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != marker {
            shifted.push(ch);
            continue;
        }

        if dialect == SqlDialect::Mssql {
            if chars.peek() == Some(&'p') {
                let _ = chars.next();
            } else {
                shifted.push(ch);
                continue;
            }
        }

        let mut digits = String::new();
        while let Some(digit) = chars.peek().filter(|ch| ch.is_ascii_digit()) {
            digits.push(*digit);
            let _ = chars.next();
        }

        if digits.is_empty() {
            shifted.push(marker);
            if dialect == SqlDialect::Mssql {
                shifted.push('p');
            }
            continue;
        }

        let index = digits.parse::<usize>().unwrap_or_default() + offset;
        shifted.push_str(&dialect.placeholder(index));
    }

    shifted
}
