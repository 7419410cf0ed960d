use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{CancelToken, DriverError, Value};

/// Narrow driver contract the core talks through. One instance maps to
/// one database connection; implementations are shared across threads
/// and guard their handle internally.
pub trait Connection: Send + Sync {
    fn execute(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<u64, DriverError>;
    fn query(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<ResultSet, DriverError>;
    fn begin(&self) -> Result<(), DriverError>;
    fn commit(&self) -> Result<(), DriverError>;
    fn rollback(&self) -> Result<(), DriverError>;
    fn prepare(&self, sql: &str) -> Result<PreparedStatement, DriverError>;
    fn close_prepared(&self, statement: &PreparedStatement) -> Result<(), DriverError>;
    /// Key of the last inserted row, where the dialect tracks one
    /// (MySQL, SQLite). `None` on dialects that hand rows back through
    /// `RETURNING` / `OUTPUT`.
    fn last_insert_id(&self) -> Result<Option<i64>, DriverError>;
}

/// Handle to a statement prepared on one connection. Reuse is scoped to
/// that connection; the statement cache owns the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub id: u64,
    pub sql: String,
}

/// Buffered query result. Column names are shared across rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: Arc::new(columns),
            rows,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }
}

/// One row of a result set, borrowing the shared column names.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub columns: &'a [String],
    pub values: &'a [Value],
}

impl<'a> Row<'a> {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }
}

/// Connection parameters handed to a dialect connector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub socket: Option<String>,
    pub extra: BTreeMap<String, String>,
}
