use modelql_core::{SqlDialect, SqlGenError, Value};

use crate::request::{
    CompareOp, Condition, ConditionValue, LogicalOp, WhereNode, json_to_value,
};

use super::{json_filter, quote_path, shift_placeholders};

/// Renders a filter tree into a SQL predicate, pushing bound values
/// onto `args`. Grouping parentheses preserve the tree's precedence;
/// `is_not` nodes render as `NOT (...)`. The argument index is always
/// `args.len() + 1`, so subquery fragments splice in with their
/// placeholders shifted to the current position.
pub fn render_where(
    node: &WhereNode,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    let mut parts = Vec::new();

    for condition in &node.conditions {
        parts.push(render_condition(condition, dialect, args)?);
    }

    for group in &node.groups {
        if group.is_empty() {
            continue;
        }
        parts.push(format!("({})", render_where(group, dialect, args)?));
    }

    if parts.is_empty() {
        return Ok("1=1".to_string());
    }

    let joiner = match node.op {
        LogicalOp::And => " AND ",
        LogicalOp::Or => " OR ",
    };
    let rendered = parts.join(joiner);

    Ok(if node.is_not {
        format!("NOT ({rendered})")
    } else {
        rendered
    })
}

fn render_condition(
    condition: &Condition,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    if let Some(json) = &condition.json {
        return json_filter::render(condition, json, dialect, args);
    }

    let column = quote_path(dialect, &condition.field);

    match condition.op {
        CompareOp::Eq => binary(column, "=", condition, dialect, args),
        CompareOp::NotEq => binary(column, "<>", condition, dialect, args),
        CompareOp::Gt => binary(column, ">", condition, dialect, args),
        CompareOp::Lt => binary(column, "<", condition, dialect, args),
        CompareOp::Gte => binary(column, ">=", condition, dialect, args),
        CompareOp::Lte => binary(column, "<=", condition, dialect, args),
        // The pattern is the caller's business, wildcards included.
        CompareOp::Like => binary(column, "LIKE", condition, dialect, args),
        CompareOp::IsNull => Ok(format!("{column} IS NULL")),
        CompareOp::IsNotNull => Ok(format!("{column} IS NOT NULL")),
        CompareOp::In => in_list(column, condition, dialect, args, false),
        CompareOp::NotIn => in_list(column, condition, dialect, args, true),
        CompareOp::Exists => exists(condition, dialect, args, false),
        CompareOp::NotExists => exists(condition, dialect, args, true),
    }
}

fn binary(
    column: String,
    operator: &str,
    condition: &Condition,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
) -> Result<String, SqlGenError> {
    let ConditionValue::Literal(raw) = &condition.value else {
        return Err(unsupported_value(dialect, condition));
    };

    args.push(json_to_value(raw));
    Ok(format!(
        "{column} {operator} {}",
        dialect.placeholder(args.len())
    ))
}

fn in_list(
    column: String,
    condition: &Condition,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
    negated: bool,
) -> Result<String, SqlGenError> {
    let operator = if negated { "NOT IN" } else { "IN" };

    let values: Vec<Value> = match &condition.value {
        ConditionValue::IntList(list) => list.iter().copied().map(Value::Int).collect(),
        ConditionValue::FloatList(list) => list.iter().copied().map(Value::Float).collect(),
        ConditionValue::StringList(list) => {
            list.iter().cloned().map(Value::Text).collect()
        }
        ConditionValue::Literal(serde_json::Value::Array(list)) => {
            list.iter().map(json_to_value).collect()
        }
        ConditionValue::Subquery { sql, args: sub_args } => {
            let shifted = shift_placeholders(sql, dialect, args.len());
            args.extend(sub_args.iter().map(json_to_value));
            return Ok(format!("{column} {operator} ({shifted})"));
        }
        _ => return Err(unsupported_value(dialect, condition)),
    };

    // An empty list has a fixed truth value; render it as such instead
    // of emitting invalid `IN ()`.
    if values.is_empty() {
        return Ok(if negated { "1=1" } else { "1=0" }.to_string());
    }

    let mut placeholders = Vec::with_capacity(values.len());
    for value in values {
        args.push(value);
        placeholders.push(dialect.placeholder(args.len()));
    }

    Ok(format!("{column} {operator} ({})", placeholders.join(", ")))
}

fn exists(
    condition: &Condition,
    dialect: SqlDialect,
    args: &mut Vec<Value>,
    negated: bool,
) -> Result<String, SqlGenError> {
    let ConditionValue::Subquery { sql, args: sub_args } = &condition.value else {
        return Err(unsupported_value(dialect, condition));
    };

    let shifted = shift_placeholders(sql, dialect, args.len());
    args.extend(sub_args.iter().map(json_to_value));

    Ok(format!(
        "{}EXISTS ({shifted})",
        if negated { "NOT " } else { "" }
    ))
}

fn unsupported_value(dialect: SqlDialect, condition: &Condition) -> SqlGenError {
    SqlGenError::UnsupportedFeature {
        dialect: dialect.name().to_string(),
        feature: format!(
            "operator {:?} with value {:?} on field `{}`",
            condition.op, condition.value, condition.field
        ),
    }
}
