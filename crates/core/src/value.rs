use std::fmt;

use chrono::{DateTime, Utc};

/// A runtime value crossing the driver boundary in both directions:
/// query arguments and result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Tag used in redacted driver-error summaries and cache keys.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::DateTime(_) => "datetime",
            Self::Json(_) => "json",
        }
    }

    /// Deterministic rendering for cache keys. Not SQL; never shown to
    /// users.
    #[must_use]
    pub fn cache_repr(&self) -> String {
        match self {
            Self::Null => "N".to_string(),
            Self::Bool(value) => format!("b:{value}"),
            Self::Int(value) => format!("i:{value}"),
            Self::Float(value) => format!("f:{}", value.to_bits()),
            Self::Text(value) => format!("t:{value}"),
            Self::Bytes(value) => format!("y:{}", value.len()),
            Self::DateTime(value) => format!("d:{}", value.timestamp_nanos_opt().unwrap_or_default()),
            Self::Json(value) => format!("j:{value}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Bytes(value) => write!(f, "<{} bytes>", value.len()),
            Self::DateTime(value) => write!(f, "{}", value.to_rfc3339()),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

/// Summarizes argument types without leaking values, for driver errors.
#[must_use]
pub fn redact_args(args: &[Value]) -> String {
    if args.is_empty() {
        return "no args".to_string();
    }

    let types = args.iter().map(Value::type_name).collect::<Vec<_>>();
    format!("{} args: [{}]", args.len(), types.join(", "))
}
