use std::collections::BTreeMap;

use modelql_core::Value;
use serde::{Deserialize, Serialize};

/// Structured read request, the JSON-equivalent query wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<OrderBy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<BTreeMap<String, Include>>,
}

impl QueryRequest {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// Recursive filter tree. Leaf conditions and sub-groups combine under
/// one logical operator; `is_not` negates the whole node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhereNode {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<WhereNode>,
    #[serde(default)]
    pub op: LogicalOp,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_not: bool,
}

impl WhereNode {
    #[must_use]
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            op: LogicalOp::Or,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn negated(mut self) -> Self {
        self.is_not = !self.is_not;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    #[serde(default, skip_serializing_if = "ConditionValue::is_none")]
    pub value: ConditionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<JsonFilter>,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: CompareOp, value: ConditionValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
            json: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    Like,
    IsNull,
    IsNotNull,
    Exists,
    NotExists,
}

/// Condition payload: a literal, a typed slice, or a subquery carrying
/// its own SQL and arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Subquery {
        sql: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StringList(Vec<String>),
    Literal(serde_json::Value),
    #[default]
    None,
}

impl ConditionValue {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }
}

/// Converts a driver value into the JSON literal shape conditions
/// carry, for filters the executor builds internally.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(raw) => serde_json::Value::Bool(*raw),
        Value::Int(raw) => serde_json::Value::from(*raw),
        Value::Float(raw) => serde_json::Value::from(*raw),
        Value::Text(raw) => serde_json::Value::String(raw.clone()),
        Value::Bytes(raw) => serde_json::Value::String(hex_string(raw)),
        Value::DateTime(raw) => serde_json::Value::String(raw.to_rfc3339()),
        Value::Json(raw) => raw.clone(),
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Converts a JSON literal from the wire into a driver value.
#[must_use]
pub fn json_to_value(raw: &serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Bool(*value),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(int) => Value::Int(int),
            None => Value::Float(number.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(value) => Value::Text(value.clone()),
        other => Value::Json(other.clone()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFilter {
    pub kind: JsonFilterKind,
    /// Path segments into the document, e.g. `["address", "city"]`.
    #[serde(default)]
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonFilterKind {
    Path,
    Contains,
    ArrayContains,
    HasKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub dir: SortDir,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Eager-load declaration for one relation field; nests arbitrarily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Include {
    Flag(bool),
    Nested(NestedInclude),
}

impl Include {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Flag(enabled) => *enabled,
            Self::Nested(_) => true,
        }
    }

    #[must_use]
    pub fn nested(&self) -> Option<&BTreeMap<String, Include>> {
        match self {
            Self::Nested(nested) => Some(&nested.include),
            Self::Flag(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedInclude {
    #[serde(default)]
    pub include: BTreeMap<String, Include>,
}
