use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use modelql_core::{ResultSet, ScanError, Value};

use crate::descriptor::{FieldKind, ModelDescriptor, ModelRegistry, Record, RelationValue, RowSink};

use super::join::IncludeNode;

/// Flat scan: each row is one result element. Included to-one
/// relations are populated from their alias-prefixed columns.
pub fn scan_flat<S: RowSink>(
    result: &ResultSet,
    descriptor: &ModelDescriptor,
    registry: &ModelRegistry,
    includes: &[IncludeNode],
    sink: &mut S,
) -> Result<(), ScanError> {
    for row_values in &result.rows {
        sink.begin_row();

        for field in &descriptor.fields {
            let value = cell(result, row_values, &field.column)?;
            sink.set_field(&field.column, convert_cell(value, field, &field.column)?)?;
        }

        for node in includes {
            let child = child_record(result, row_values, registry, node)?;
            sink.set_relation(&node.name, RelationValue::One(child.map(Box::new)));
        }

        sink.finish_row();
    }

    Ok(())
}

/// Grouped scan for plans with one-to-many includes: rows group by the
/// root primary key, children build only from non-NULL child keys and
/// deduplicate by key, and included collections materialize even when
/// empty.
pub fn scan_grouped(
    result: &ResultSet,
    descriptor: &ModelDescriptor,
    registry: &ModelRegistry,
    includes: &[IncludeNode],
) -> Result<Vec<Record>, ScanError> {
    let row_refs = result.rows.iter().collect::<Vec<_>>();
    materialize_level(result, &row_refs, descriptor, registry, includes, "")
}

fn materialize_level(
    result: &ResultSet,
    rows: &[&Vec<Value>],
    descriptor: &ModelDescriptor,
    registry: &ModelRegistry,
    includes: &[IncludeNode],
    prefix: &str,
) -> Result<Vec<Record>, ScanError> {
    let key_column = prefixed(prefix, &descriptor.primary_key);

    // Group rows by this level's key, first-seen order preserved.
    let mut order = Vec::new();
    let mut groups: Vec<Vec<&Vec<Value>>> = Vec::new();
    for row in rows {
        let key = cell(result, row, &key_column)?.cache_repr();
        match order.iter().position(|existing| *existing == key) {
            Some(index) => groups[index].push(row),
            None => {
                order.push(key);
                groups.push(vec![row]);
            }
        }
    }

    let mut records = Vec::with_capacity(groups.len());
    for group in groups {
        let first = group.first().expect("groups are non-empty");

        let mut record = Record::default();
        for field in &descriptor.fields {
            let column = prefixed(prefix, &field.column);
            let value = cell(result, first, &column)?;
            record
                .fields
                .insert(field.column.clone(), convert_cell(value, field, &column)?);
        }

        for node in includes {
            let child_descriptor = registry.descriptor(&node.relation.related_table)?;
            let child_key_column = prefixed(&node.alias, &child_descriptor.primary_key);

            // Only rows that actually joined a child contribute one.
            let child_rows = group
                .iter()
                .copied()
                .filter(|row| {
                    cell(result, row, &child_key_column)
                        .map(|value| !value.is_null())
                        .unwrap_or(false)
                })
                .collect::<Vec<_>>();

            let children = materialize_level(
                result,
                &child_rows,
                child_descriptor,
                registry,
                &node.children,
                &node.alias,
            )?;

            let value = if node.relation.is_list {
                RelationValue::Many(children)
            } else {
                RelationValue::One(children.into_iter().next().map(Box::new))
            };
            record.relations.insert(node.name.clone(), value);
        }

        records.push(record);
    }

    Ok(records)
}

fn child_record(
    result: &ResultSet,
    row: &Vec<Value>,
    registry: &ModelRegistry,
    node: &IncludeNode,
) -> Result<Option<Record>, ScanError> {
    let descriptor = registry.descriptor(&node.relation.related_table)?;
    let key_column = prefixed(&node.alias, &descriptor.primary_key);
    if cell(result, row, &key_column)?.is_null() {
        return Ok(None);
    }

    let mut record = Record::default();
    for field in &descriptor.fields {
        let column = prefixed(&node.alias, &field.column);
        let value = cell(result, row, &column)?;
        record
            .fields
            .insert(field.column.clone(), convert_cell(value, field, &column)?);
    }

    for child in &node.children {
        let nested = child_record(result, row, registry, child)?;
        record
            .relations
            .insert(child.name.clone(), RelationValue::One(nested.map(Box::new)));
    }

    Ok(Some(record))
}

fn prefixed(prefix: &str, column: &str) -> String {
    if prefix.is_empty() {
        column.to_string()
    } else {
        format!("{prefix}_{column}")
    }
}

fn cell(result: &ResultSet, row: &Vec<Value>, column: &str) -> Result<Value, ScanError> {
    let index = result
        .column_index(column)
        .ok_or_else(|| ScanError::MissingColumn {
            column: column.to_string(),
        })?;
    Ok(row.get(index).cloned().unwrap_or(Value::Null))
}

/// Applies the dialect fixups on one cell: integers standing in for
/// booleans, datetime text, JSON text, and integer-typed floats.
pub fn convert_cell(
    value: Value,
    field: &crate::descriptor::FieldDescriptor,
    column: &str,
) -> Result<Value, ScanError> {
    match (field.kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (FieldKind::Bool, Value::Int(raw)) => Ok(Value::Bool(raw != 0)),
        (FieldKind::Bool, Value::Bool(raw)) => Ok(Value::Bool(raw)),
        (FieldKind::Int, Value::Int(raw)) => Ok(Value::Int(raw)),
        (FieldKind::Float, Value::Float(raw)) => Ok(Value::Float(raw)),
        (FieldKind::Float, Value::Int(raw)) => Ok(Value::Float(raw as f64)),
        (FieldKind::String, Value::Text(raw)) => Ok(Value::Text(raw)),
        (FieldKind::Bytes, Value::Bytes(raw)) => Ok(Value::Bytes(raw)),
        (FieldKind::DateTime, Value::DateTime(raw)) => Ok(Value::DateTime(raw)),
        (FieldKind::DateTime, Value::Text(raw)) => {
            parse_datetime(&raw, column).map(Value::DateTime)
        }
        (FieldKind::Json, Value::Json(raw)) => Ok(Value::Json(raw)),
        (FieldKind::Json, Value::Text(raw)) => serde_json::from_str(&raw)
            .map(Value::Json)
            .map_err(|_| ScanError::TypeMismatch {
                column: column.to_string(),
                expected: "json".to_string(),
                found: "unparseable text".to_string(),
            }),
        (kind, other) => Err(ScanError::TypeMismatch {
            column: column.to_string(),
            expected: format!("{kind:?}").to_lowercase(),
            found: other.type_name().to_string(),
        }),
    }
}

/// The datetime format cascade: RFC 3339 (nanosecond or second
/// precision), `YYYY-MM-DD[ T]HH:MM:SS[.frac]` with an optional
/// offset, then a local-time interpretation as the last resort.
pub fn parse_datetime(raw: &str, column: &str) -> Result<DateTime<Utc>, ScanError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&parsed));
        }
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M") {
        return match Local.from_local_datetime(&parsed).single() {
            Some(local) => Ok(local.with_timezone(&Utc)),
            None => Ok(Utc.from_utc_datetime(&parsed)),
        };
    }

    Err(ScanError::UnparseableDateTime {
        column: column.to_string(),
        raw: raw.to_string(),
    })
}
