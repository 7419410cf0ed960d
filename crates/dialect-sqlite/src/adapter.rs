use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value as SqliteValue;

use modelql_core::{
    CancelToken, Connection, ConnectionConfig, DriverError, PreparedStatement, ResultSet, Value,
    redact_args,
};

const CONNECT_SQL: &str = "CONNECT sqlite";
const POISONED_CONNECTION_MESSAGE: &str = "sqlite connection state was poisoned";
const STATEMENT_CACHE_CAPACITY: usize = 128;

pub(crate) struct SqliteAdapter {
    connection: Mutex<rusqlite::Connection>,
    next_statement_id: Mutex<u64>,
}

pub(crate) fn connect(config: &ConnectionConfig) -> Result<Box<dyn Connection>, DriverError> {
    let connection = rusqlite::Connection::open(&config.database)
        .map_err(|source| DriverError::with_source(CONNECT_SQL, "no args", source))?;
    connection.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

    Ok(Box::new(SqliteAdapter {
        connection: Mutex::new(connection),
        next_statement_id: Mutex::new(0),
    }))
}

impl SqliteAdapter {
    fn lock_connection(
        &self,
        sql: &str,
        args: &[Value],
    ) -> Result<MutexGuard<'_, rusqlite::Connection>, DriverError> {
        self.connection
            .lock()
            .map_err(|_| DriverError::new(sql, redact_args(args), POISONED_CONNECTION_MESSAGE))
    }

    fn check_cancelled(sql: &str, args: &[Value], ctx: &CancelToken) -> Result<(), DriverError> {
        if ctx.is_cancelled() {
            return Err(DriverError::new(sql, redact_args(args), "operation cancelled"));
        }
        Ok(())
    }
}

impl Connection for SqliteAdapter {
    fn execute(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<u64, DriverError> {
        Self::check_cancelled(sql, args, ctx)?;
        let connection = self.lock_connection(sql, args)?;
        let mut statement = connection
            .prepare_cached(sql)
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;
        let affected = statement
            .execute(rusqlite::params_from_iter(bind_args(args)))
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;
        Ok(affected as u64)
    }

    fn query(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<ResultSet, DriverError> {
        Self::check_cancelled(sql, args, ctx)?;
        let connection = self.lock_connection(sql, args)?;
        let mut statement = connection
            .prepare_cached(sql)
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;

        let columns = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let column_count = columns.len();

        let mut rows = statement
            .query(rusqlite::params_from_iter(bind_args(args)))
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;

        let mut decoded = Vec::new();
        loop {
            let row = rows
                .next()
                .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;
            let Some(row) = row else {
                break;
            };

            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                let cell = row
                    .get::<_, SqliteValue>(index)
                    .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;
                values.push(decode_cell(cell));
            }
            decoded.push(values);
        }

        Ok(ResultSet::new(columns, decoded))
    }

    fn begin(&self) -> Result<(), DriverError> {
        self.batch("BEGIN")
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.batch("COMMIT")
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.batch("ROLLBACK")
    }

    fn prepare(&self, sql: &str) -> Result<PreparedStatement, DriverError> {
        let connection = self.lock_connection(sql, &[])?;
        connection
            .prepare_cached(sql)
            .map_err(|source| DriverError::with_source(sql, "no args", source))?;
        let mut next_id = self
            .next_statement_id
            .lock()
            .map_err(|_| DriverError::new(sql, "no args", POISONED_CONNECTION_MESSAGE))?;
        *next_id += 1;
        Ok(PreparedStatement {
            id: *next_id,
            sql: sql.to_string(),
        })
    }

    fn close_prepared(&self, _statement: &PreparedStatement) -> Result<(), DriverError> {
        // rusqlite's own cache owns the handle; dropping our entry is
        // enough.
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        let connection = self.lock_connection("SELECT last_insert_rowid()", &[])?;
        Ok(Some(connection.last_insert_rowid()))
    }
}

impl SqliteAdapter {
    fn batch(&self, sql: &str) -> Result<(), DriverError> {
        let connection = self.lock_connection(sql, &[])?;
        connection
            .execute_batch(sql)
            .map_err(|source| DriverError::with_source(sql, "no args", source))
    }
}

fn bind_args(args: &[Value]) -> Vec<SqliteValue> {
    args.iter()
        .map(|value| match value {
            Value::Null => SqliteValue::Null,
            Value::Bool(raw) => SqliteValue::Integer(i64::from(*raw)),
            Value::Int(raw) => SqliteValue::Integer(*raw),
            Value::Float(raw) => SqliteValue::Real(*raw),
            Value::Text(raw) => SqliteValue::Text(raw.clone()),
            Value::Bytes(raw) => SqliteValue::Blob(raw.clone()),
            Value::DateTime(raw) => SqliteValue::Text(raw.to_rfc3339()),
            Value::Json(raw) => SqliteValue::Text(raw.to_string()),
        })
        .collect()
}

fn decode_cell(cell: SqliteValue) -> Value {
    match cell {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(raw) => Value::Int(raw),
        SqliteValue::Real(raw) => Value::Float(raw),
        SqliteValue::Text(raw) => Value::Text(raw),
        SqliteValue::Blob(raw) => Value::Bytes(raw),
    }
}
