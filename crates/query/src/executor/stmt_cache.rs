use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use modelql_core::{Connection, DriverError, PreparedStatement};

/// Prepared statements keyed by SQL text, scoped to one connection.
/// Reads share a lock; first-time preparation takes the exclusive one.
/// Nothing evicts entries except an explicit [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct StatementCache {
    inner: RwLock<HashMap<String, Arc<PreparedStatement>>>,
}

impl StatementCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_prepare(
        &self,
        connection: &dyn Connection,
        sql: &str,
    ) -> Result<Arc<PreparedStatement>, DriverError> {
        if let Some(statement) = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(sql)
        {
            return Ok(Arc::clone(statement));
        }

        let prepared = Arc::new(connection.prepare(sql)?);
        let mut cache = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A racing caller may have prepared the same text; keep the
        // first statement so both handles stay valid.
        let entry = cache
            .entry(sql.to_string())
            .or_insert_with(|| Arc::clone(&prepared));
        Ok(Arc::clone(entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every cached statement on the connection and forgets
    /// them.
    pub fn clear(&self, connection: &dyn Connection) -> Result<(), DriverError> {
        let mut cache = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for statement in cache.values() {
            connection.close_prepared(statement)?;
        }
        cache.clear();
        Ok(())
    }
}
