use std::collections::BTreeMap;

use modelql_core::{ScanError, Value};
use modelql_datamodel::{ModelRelations, RelationField};

/// Per-model mapping computed once at registry build time; the row
/// scanner reads these instead of inspecting destination shapes per
/// row.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub model: String,
    pub table: String,
    /// Ordered as declared on the model.
    pub fields: Vec<FieldDescriptor>,
    pub primary_key: String,
}

impl ModelDescriptor {
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.column == column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub column: String,
    pub kind: FieldKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Bool,
    String,
    Bytes,
    DateTime,
    Json,
}

/// Descriptors plus relation metadata for every model the executor can
/// serve.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    descriptors: BTreeMap<String, ModelDescriptor>,
    relations: BTreeMap<String, ModelRelations>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ModelDescriptor, relations: ModelRelations) {
        self.relations.insert(descriptor.table.clone(), relations);
        self.descriptors
            .insert(descriptor.table.clone(), descriptor);
    }

    pub fn descriptor(&self, table: &str) -> Result<&ModelDescriptor, ScanError> {
        self.descriptors
            .get(table)
            .ok_or_else(|| ScanError::UnknownModel {
                table: table.to_string(),
            })
    }

    #[must_use]
    pub fn relations(&self, table: &str) -> Option<&ModelRelations> {
        self.relations.get(table)
    }

    #[must_use]
    pub fn relation(&self, table: &str, name: &str) -> Option<&RelationField> {
        self.relations(table).and_then(|model| model.relation(name))
    }
}

/// A materialized row graph node: scalar fields plus eagerly loaded
/// relations. Included list relations are always concrete collections,
/// never null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
    pub relations: BTreeMap<String, RelationValue>,
}

impl Record {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl RelationValue {
    #[must_use]
    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            Self::Many(records) => Some(records),
            Self::One(_) => None,
        }
    }

    #[must_use]
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(record) => record.as_deref(),
            Self::Many(_) => None,
        }
    }
}

/// Destination the flat scanner writes into. The provided
/// [`RecordSink`] materializes generic [`Record`]s; generated per-model
/// implementations can write straight into typed structs without any
/// runtime field lookup.
pub trait RowSink {
    fn begin_row(&mut self);
    fn set_field(&mut self, column: &str, value: Value) -> Result<(), ScanError>;
    fn set_relation(&mut self, name: &str, child: RelationValue);
    fn finish_row(&mut self);
}

#[derive(Debug, Default)]
pub struct RecordSink {
    records: Vec<Record>,
    current: Option<Record>,
}

impl RecordSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_records(mut self) -> Vec<Record> {
        if let Some(current) = self.current.take() {
            self.records.push(current);
        }
        self.records
    }
}

impl RowSink for RecordSink {
    fn begin_row(&mut self) {
        if let Some(previous) = self.current.take() {
            self.records.push(previous);
        }
        self.current = Some(Record::default());
    }

    fn set_field(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
        if let Some(current) = self.current.as_mut() {
            current.fields.insert(column.to_string(), value);
        }
        Ok(())
    }

    fn set_relation(&mut self, name: &str, child: RelationValue) {
        if let Some(current) = self.current.as_mut() {
            current.relations.insert(name.to_string(), child);
        }
    }

    fn finish_row(&mut self) {
        if let Some(current) = self.current.take() {
            self.records.push(current);
        }
    }
}
