use std::collections::BTreeMap;

use modelql_core::Value;

use crate::request::WhereNode;

/// A write request: the parent operation plus nested operations on
/// named relations, all executed inside one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub table: String,
    pub operation: WriteOperation,
    pub data: BTreeMap<String, Value>,
    /// Row selector for updates; ignored on create.
    pub filter: Option<WhereNode>,
    pub nested: Vec<NestedWrite>,
}

impl WriteRequest {
    pub fn create(table: impl Into<String>, data: BTreeMap<String, Value>) -> Self {
        Self {
            table: table.into(),
            operation: WriteOperation::Create,
            data,
            filter: None,
            nested: Vec::new(),
        }
    }

    pub fn update(
        table: impl Into<String>,
        data: BTreeMap<String, Value>,
        filter: WhereNode,
    ) -> Self {
        Self {
            table: table.into(),
            operation: WriteOperation::Update,
            data,
            filter: Some(filter),
            nested: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_nested(mut self, relation: impl Into<String>, op: NestedWriteOp) -> Self {
        self.nested.push(NestedWrite {
            relation: relation.into(),
            op,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedWrite {
    pub relation: String,
    pub op: NestedWriteOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NestedWriteOp {
    /// Insert a related row wired to the parent.
    Create { data: BTreeMap<String, Value> },
    /// Update related rows, always scoped to the parent.
    Update {
        filter: Option<WhereNode>,
        data: BTreeMap<String, Value>,
    },
    /// Delete related rows (junction rows on many-to-many), scoped to
    /// the parent.
    Delete { filter: Option<WhereNode> },
    /// Point an existing related row at the parent.
    Connect { id: Value },
    /// Detach one related row, or all of them when `id` is `None`.
    Disconnect { id: Option<Value> },
    /// Disconnect everything, then connect exactly the given rows.
    Set { ids: Vec<Value> },
    /// Update the matching related row, or create it if absent.
    Upsert {
        filter: WhereNode,
        create: BTreeMap<String, Value>,
        update: BTreeMap<String, Value>,
    },
}
