use crate::{
    Column, DefaultValue,
    diff::flavour::{ColumnTypeChange, Flavour},
};

/// What changed between a paired previous/next column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnChanges {
    pub type_change: Option<ColumnTypeChange>,
    pub nullable_changed: bool,
    pub default_changed: bool,
    pub auto_increment_changed: bool,
}

impl ColumnChanges {
    #[must_use]
    pub fn differs_in_something(&self) -> bool {
        self.type_change.is_some()
            || self.nullable_changed
            || self.default_changed
            || self.auto_increment_changed
    }

    #[must_use]
    pub fn type_changed(&self) -> bool {
        self.type_change.is_some()
    }
}

pub fn all_changes(previous: &Column, next: &Column, flavour: &dyn Flavour) -> ColumnChanges {
    ColumnChanges {
        type_change: flavour.column_type_change(previous, next),
        nullable_changed: previous.nullable != next.nullable,
        default_changed: !defaults_match(previous.default.as_ref(), next.default.as_ref()),
        auto_increment_changed: previous.auto_increment != next.auto_increment,
    }
}

/// Type-aware default comparison. Naive string equality misclassifies
/// JSON (key order), datetime functions (spelling varies per dialect),
/// enum literals (quoting varies), and numerics (whitespace).
fn defaults_match(previous: Option<&DefaultValue>, next: Option<&DefaultValue>) -> bool {
    match (previous, next) {
        (None, None) => true,
        (Some(previous), Some(next)) => default_values_match(previous, next),
        _ => false,
    }
}

fn default_values_match(previous: &DefaultValue, next: &DefaultValue) -> bool {
    match (previous, next) {
        (DefaultValue::Literal(previous), DefaultValue::Literal(next)) => {
            literal_defaults_match(previous, next)
        }
        (
            DefaultValue::Function { name: previous, .. },
            DefaultValue::Function { name: next, .. },
        ) => {
            if is_datetime_function(previous) && is_datetime_function(next) {
                return true;
            }
            previous.eq_ignore_ascii_case(next)
        }
        _ => false,
    }
}

fn literal_defaults_match(previous: &str, next: &str) -> bool {
    if previous == next {
        return true;
    }

    if let (Ok(previous_json), Ok(next_json)) = (
        serde_json::from_str::<serde_json::Value>(previous),
        serde_json::from_str::<serde_json::Value>(next),
    ) && !previous_json.is_number()
    {
        return previous_json == next_json;
    }

    // Enum and string defaults come back from introspection with
    // varying quote styles.
    if strip_quotes(previous) == strip_quotes(next) {
        return true;
    }

    previous.trim() == next.trim()
}

fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('\'')
        .and_then(|value| value.strip_suffix('\''))
        .or_else(|| {
            trimmed
                .strip_prefix('"')
                .and_then(|value| value.strip_suffix('"'))
        })
        .unwrap_or(trimmed)
}

/// Every datetime "current time" function compares equal to every
/// other, across dialect spellings.
fn is_datetime_function(name: &str) -> bool {
    let base = name
        .split('(')
        .next()
        .unwrap_or(name)
        .trim()
        .to_ascii_lowercase();
    matches!(
        base.as_str(),
        "now"
            | "current_timestamp"
            | "transaction_timestamp"
            | "statement_timestamp"
            | "localtimestamp"
            | "getdate"
            | "sysdate"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults_compare_structurally() {
        let previous = DefaultValue::literal(r#"{"a": 1, "b": 2}"#);
        let next = DefaultValue::literal(r#"{"b":2,"a":1}"#);
        assert!(default_values_match(&previous, &next));
    }

    #[test]
    fn datetime_functions_compare_equal_across_spellings() {
        let previous = DefaultValue::function("CURRENT_TIMESTAMP");
        let next = DefaultValue::function("now");
        assert!(default_values_match(&previous, &next));
    }

    #[test]
    fn enum_defaults_ignore_surrounding_quotes() {
        let previous = DefaultValue::literal("'ACTIVE'");
        let next = DefaultValue::literal("ACTIVE");
        assert!(default_values_match(&previous, &next));
    }

    #[test]
    fn numeric_defaults_ignore_whitespace() {
        let previous = DefaultValue::literal(" 3 ");
        let next = DefaultValue::literal("3");
        assert!(default_values_match(&previous, &next));
    }

    #[test]
    fn literal_and_function_defaults_differ() {
        let previous = DefaultValue::literal("0");
        let next = DefaultValue::function("now");
        assert!(!default_values_match(&previous, &next));
    }
}
