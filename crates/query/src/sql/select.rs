use std::fmt::Write as _;

use modelql_core::{SqlDialect, SqlGenError, Value};

use crate::request::{OrderBy, QueryRequest};

use super::{SqlQuery, quote_path, render_where, shift_placeholders};

/// MySQL cannot express OFFSET without LIMIT; this is the documented
/// "all the rows" sentinel.
const MYSQL_NO_LIMIT_SENTINEL: &str = "18446744073709551615";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Inner,
}

impl JoinKind {
    #[must_use]
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Left => "LEFT JOIN",
            Self::Inner => "INNER JOIN",
        }
    }
}

/// One join edge of a planned query. `on_left`/`on_right` are
/// alias-qualified column paths (`posts.authorId`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub alias: String,
    pub on_left: String,
    pub on_right: String,
    /// Columns to project from the joined table, emitted as
    /// `"alias"."col" AS "alias_col"`.
    pub columns: Vec<String>,
}

/// Plain single-table SELECT.
pub fn select(request: &QueryRequest, dialect: SqlDialect) -> Result<SqlQuery, SqlGenError> {
    let mut args = Vec::new();
    let mut sql = String::new();

    write!(
        sql,
        "SELECT {} FROM {}",
        projection(request, dialect),
        dialect.quote_ident(&request.table)
    )
    .expect("writing to String should not fail");

    push_where(&mut sql, request, dialect, &mut args)?;
    push_order_limit_offset(
        &mut sql,
        request.order_by.as_deref(),
        request.limit,
        request.offset,
        dialect,
    )?;

    Ok(SqlQuery::new(sql, args))
}

/// SELECT with the planned relation joins. The root table keeps its
/// own name as alias; joined columns are prefixed so the scanner can
/// route them to relations.
pub fn select_with_joins(
    request: &QueryRequest,
    joins: &[Join],
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if joins.is_empty() {
        return select(request, dialect);
    }

    let mut args = Vec::new();
    let root = dialect.quote_ident(&request.table);

    let mut projected = match &request.select {
        Some(columns) => columns
            .iter()
            .map(|column| format!("{root}.{}", dialect.quote_ident(column)))
            .collect::<Vec<_>>(),
        None => vec![format!("{root}.*")],
    };
    for join in joins {
        for column in &join.columns {
            projected.push(format!(
                "{}.{} AS {}",
                dialect.quote_ident(&join.alias),
                dialect.quote_ident(column),
                dialect.quote_ident(&format!("{}_{}", join.alias, column))
            ));
        }
    }

    let mut sql = format!("SELECT {} FROM {root}", projected.join(", "));
    for join in joins {
        write!(
            sql,
            " {} {} AS {} ON {} = {}",
            join.kind.as_sql(),
            dialect.quote_ident(&join.table),
            dialect.quote_ident(&join.alias),
            quote_path(dialect, &join.on_left),
            quote_path(dialect, &join.on_right),
        )
        .expect("writing to String should not fail");
    }

    push_where(&mut sql, request, dialect, &mut args)?;
    push_order_limit_offset(
        &mut sql,
        request.order_by.as_deref(),
        request.limit,
        request.offset,
        dialect,
    )?;

    Ok(SqlQuery::new(sql, args))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    #[must_use]
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub func: AggregateFunc,
    /// `None` means `*`, which only COUNT accepts.
    pub field: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub aggregations: Vec<Aggregation>,
    pub group_by: Vec<String>,
}

pub fn aggregate(
    request: &QueryRequest,
    spec: &Aggregate,
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if spec.aggregations.is_empty() {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: "aggregate query without aggregations".to_string(),
        });
    }

    let mut args = Vec::new();
    let mut projected = spec
        .group_by
        .iter()
        .map(|column| dialect.quote_ident(column))
        .collect::<Vec<_>>();

    for aggregation in &spec.aggregations {
        let target = match &aggregation.field {
            Some(field) => dialect.quote_ident(field),
            None if aggregation.func == AggregateFunc::Count => "*".to_string(),
            None => {
                return Err(SqlGenError::UnsupportedFeature {
                    dialect: dialect.name().to_string(),
                    feature: format!("{:?} over all columns", aggregation.func),
                });
            }
        };
        projected.push(format!(
            "{}({target}) AS {}",
            aggregation.func.as_sql(),
            dialect.quote_ident(&aggregation.alias)
        ));
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        projected.join(", "),
        dialect.quote_ident(&request.table)
    );
    push_where(&mut sql, request, dialect, &mut args)?;

    if !spec.group_by.is_empty() {
        let grouped = spec
            .group_by
            .iter()
            .map(|column| dialect.quote_ident(column))
            .collect::<Vec<_>>();
        write!(sql, " GROUP BY {}", grouped.join(", ")).expect("writing to String should not fail");
    }

    push_order_limit_offset(
        &mut sql,
        request.order_by.as_deref(),
        request.limit,
        request.offset,
        dialect,
    )?;

    Ok(SqlQuery::new(sql, args))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpression {
    pub name: String,
    pub query: SqlQuery,
}

/// `WITH name AS (...) <main>`. Every fragment was rendered with
/// placeholders starting at 1; splicing re-numbers them into one
/// argument sequence.
pub fn select_with_cte(
    ctes: &[CommonTableExpression],
    main: SqlQuery,
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if dialect == SqlDialect::Mongodb {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: "common table expressions".to_string(),
        });
    }
    if ctes.is_empty() {
        return Ok(main);
    }

    let mut args: Vec<Value> = Vec::new();
    let mut clauses = Vec::with_capacity(ctes.len());

    for cte in ctes {
        let shifted = shift_placeholders(&cte.query.sql, dialect, args.len());
        args.extend(cte.query.args.iter().cloned());
        clauses.push(format!(
            "{} AS ({shifted})",
            dialect.quote_ident(&cte.name)
        ));
    }

    let main_sql = shift_placeholders(&main.sql, dialect, args.len());
    args.extend(main.args);

    Ok(SqlQuery::new(
        format!("WITH {} {main_sql}", clauses.join(", ")),
        args,
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowFunction {
    /// Call as written, e.g. `ROW_NUMBER()` or `SUM("amount")`.
    pub call: String,
    pub partition_by: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub alias: String,
}

pub fn select_with_windows(
    request: &QueryRequest,
    windows: &[WindowFunction],
    dialect: SqlDialect,
) -> Result<SqlQuery, SqlGenError> {
    if dialect == SqlDialect::Mongodb {
        return Err(SqlGenError::UnsupportedFeature {
            dialect: dialect.name().to_string(),
            feature: "window functions (use an aggregation pipeline)".to_string(),
        });
    }

    let mut args = Vec::new();
    let mut projected = vec![projection(request, dialect)];

    for window in windows {
        let mut over = String::new();
        if !window.partition_by.is_empty() {
            let partition = window
                .partition_by
                .iter()
                .map(|column| dialect.quote_ident(column))
                .collect::<Vec<_>>();
            write!(over, "PARTITION BY {}", partition.join(", "))
                .expect("writing to String should not fail");
        }
        if !window.order_by.is_empty() {
            if !over.is_empty() {
                over.push(' ');
            }
            write!(over, "ORDER BY {}", order_clause(&window.order_by, dialect))
                .expect("writing to String should not fail");
        }
        projected.push(format!(
            "{} OVER ({over}) AS {}",
            window.call,
            dialect.quote_ident(&window.alias)
        ));
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        projected.join(", "),
        dialect.quote_ident(&request.table)
    );
    push_where(&mut sql, request, dialect, &mut args)?;
    push_order_limit_offset(
        &mut sql,
        request.order_by.as_deref(),
        request.limit,
        request.offset,
        dialect,
    )?;

    Ok(SqlQuery::new(sql, args))
}

fn projection(request: &QueryRequest, dialect: SqlDialect) -> String {
    match &request.select {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .map(|column| dialect.quote_ident(column))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "*".to_string(),
    }
}

fn push_where(
    sql: &mut String,
    request: &QueryRequest,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<(), SqlGenError> {
    if let Some(filter) = &request.filter
        && !filter.is_empty()
    {
        let rendered = render_where(filter, dialect, args)?;
        write!(sql, " WHERE {rendered}").expect("writing to String should not fail");
    }
    Ok(())
}

fn order_clause(order_by: &[OrderBy], dialect: SqlDialect) -> String {
    order_by
        .iter()
        .map(|order| format!("{} {}", quote_path(dialect, &order.field), order.dir.as_sql()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn push_order_limit_offset(
    sql: &mut String,
    order_by: Option<&[OrderBy]>,
    limit: Option<u64>,
    offset: Option<u64>,
    dialect: SqlDialect,
) -> Result<(), SqlGenError> {
    let has_order = order_by.is_some_and(|order| !order.is_empty());
    if let Some(order) = order_by
        && !order.is_empty()
    {
        write!(sql, " ORDER BY {}", order_clause(order, dialect))
            .expect("writing to String should not fail");
    }

    if limit.is_none() && offset.is_none() {
        return Ok(());
    }

    match dialect {
        SqlDialect::Mssql => {
            // OFFSET/FETCH is only valid under an ORDER BY.
            if !has_order {
                sql.push_str(" ORDER BY (SELECT NULL)");
            }
            write!(sql, " OFFSET {} ROWS", offset.unwrap_or(0))
                .expect("writing to String should not fail");
            if let Some(limit) = limit {
                write!(sql, " FETCH NEXT {limit} ROWS ONLY")
                    .expect("writing to String should not fail");
            }
        }
        SqlDialect::Mysql => {
            match (limit, offset) {
                (Some(limit), Some(offset)) => {
                    write!(sql, " LIMIT {limit} OFFSET {offset}")
                        .expect("writing to String should not fail");
                }
                (Some(limit), None) => {
                    write!(sql, " LIMIT {limit}").expect("writing to String should not fail");
                }
                (None, Some(offset)) => {
                    write!(sql, " LIMIT {MYSQL_NO_LIMIT_SENTINEL} OFFSET {offset}")
                        .expect("writing to String should not fail");
                }
                (None, None) => {}
            }
        }
        SqlDialect::Postgres | SqlDialect::Sqlite => {
            if let Some(limit) = limit {
                write!(sql, " LIMIT {limit}").expect("writing to String should not fail");
            } else if offset.is_some() && dialect == SqlDialect::Sqlite {
                // SQLite's OFFSET is grammatically attached to LIMIT.
                sql.push_str(" LIMIT -1");
            }
            if let Some(offset) = offset {
                write!(sql, " OFFSET {offset}").expect("writing to String should not fail");
            }
        }
        SqlDialect::Mongodb => {
            return Err(SqlGenError::UnsupportedFeature {
                dialect: dialect.name().to_string(),
                feature: "SQL pagination".to_string(),
            });
        }
    }

    Ok(())
}
