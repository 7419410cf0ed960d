use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{TimeZone, Utc};
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Params, Row as MysqlRow, Statement};

use modelql_core::{
    CancelToken, Connection, ConnectionConfig, DriverError, PreparedStatement, ResultSet, Value,
    redact_args,
};

const CONNECT_SQL: &str = "CONNECT mysql";
const POISONED_CONNECTION_MESSAGE: &str = "mysql connection state was poisoned";

pub(crate) struct MysqlAdapter {
    connection: Mutex<Conn>,
    statements: Mutex<HashMap<String, Statement>>,
    next_statement_id: Mutex<u64>,
}

pub(crate) fn connect(config: &ConnectionConfig) -> Result<Box<dyn Connection>, DriverError> {
    let mut builder = OptsBuilder::new().db_name(Some(config.database.clone()));

    if let Some(socket) = &config.socket {
        builder = builder.socket(Some(socket.clone()));
    } else if let Some(host) = &config.host {
        builder = builder.ip_or_hostname(Some(host.clone()));
    }
    if let Some(port) = config.port {
        builder = builder.tcp_port(port);
    }
    if let Some(user) = &config.user {
        builder = builder.user(Some(user.clone()));
    }
    if let Some(password) = &config.password {
        builder = builder.pass(Some(password.clone()));
    }

    let connection = Conn::new(Opts::from(builder))
        .map_err(|source| DriverError::with_source(CONNECT_SQL, "no args", source))?;

    Ok(Box::new(MysqlAdapter {
        connection: Mutex::new(connection),
        statements: Mutex::new(HashMap::new()),
        next_statement_id: Mutex::new(0),
    }))
}

impl MysqlAdapter {
    fn lock_connection(&self, sql: &str, args: &[Value]) -> Result<MutexGuard<'_, Conn>, DriverError> {
        self.connection
            .lock()
            .map_err(|_| DriverError::new(sql, redact_args(args), POISONED_CONNECTION_MESSAGE))
    }

    fn cached_statement(
        &self,
        connection: &mut Conn,
        sql: &str,
        args: &[Value],
    ) -> Result<Statement, DriverError> {
        let mut statements = self
            .statements
            .lock()
            .map_err(|_| DriverError::new(sql, redact_args(args), POISONED_CONNECTION_MESSAGE))?;
        if let Some(statement) = statements.get(sql) {
            return Ok(statement.clone());
        }

        let statement = connection
            .prep(sql)
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;
        statements.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }

    fn check_cancelled(sql: &str, args: &[Value], ctx: &CancelToken) -> Result<(), DriverError> {
        if ctx.is_cancelled() {
            return Err(DriverError::new(sql, redact_args(args), "operation cancelled"));
        }
        Ok(())
    }
}

impl Connection for MysqlAdapter {
    fn execute(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<u64, DriverError> {
        Self::check_cancelled(sql, args, ctx)?;
        let mut connection = self.lock_connection(sql, args)?;
        let statement = self.cached_statement(&mut connection, sql, args)?;
        connection
            .exec_drop(&statement, bind_args(args))
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;
        Ok(connection.affected_rows())
    }

    fn query(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<ResultSet, DriverError> {
        Self::check_cancelled(sql, args, ctx)?;
        let mut connection = self.lock_connection(sql, args)?;
        let statement = self.cached_statement(&mut connection, sql, args)?;
        let rows: Vec<MysqlRow> = connection
            .exec(&statement, bind_args(args))
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;

        Ok(decode_rows(&rows))
    }

    fn begin(&self) -> Result<(), DriverError> {
        self.batch("START TRANSACTION")
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.batch("COMMIT")
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.batch("ROLLBACK")
    }

    fn prepare(&self, sql: &str) -> Result<PreparedStatement, DriverError> {
        let mut connection = self.lock_connection(sql, &[])?;
        self.cached_statement(&mut connection, sql, &[])?;
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

    fn close_prepared(&self, statement: &PreparedStatement) -> Result<(), DriverError> {
        let mut statements = self
            .statements
            .lock()
            .map_err(|_| DriverError::new(&statement.sql, "no args", POISONED_CONNECTION_MESSAGE))?;
        statements.remove(&statement.sql);
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        let connection = self.lock_connection("SELECT LAST_INSERT_ID()", &[])?;
        let id = connection.last_insert_id();
        Ok((id != 0).then(|| id as i64))
    }
}

impl MysqlAdapter {
    fn batch(&self, sql: &str) -> Result<(), DriverError> {
        let mut connection = self.lock_connection(sql, &[])?;
        connection
            .query_drop(sql)
            .map_err(|source| DriverError::with_source(sql, "no args", source))
    }
}

fn bind_args(args: &[Value]) -> Params {
    if args.is_empty() {
        return Params::Empty;
    }

    let positional = args
        .iter()
        .map(|value| match value {
            Value::Null => mysql::Value::NULL,
            Value::Bool(raw) => mysql::Value::Int(i64::from(*raw)),
            Value::Int(raw) => mysql::Value::Int(*raw),
            Value::Float(raw) => mysql::Value::Double(*raw),
            Value::Text(raw) => mysql::Value::Bytes(raw.clone().into_bytes()),
            Value::Bytes(raw) => mysql::Value::Bytes(raw.clone()),
            Value::DateTime(raw) => mysql::Value::Bytes(
                raw.format("%Y-%m-%d %H:%M:%S%.6f").to_string().into_bytes(),
            ),
            Value::Json(raw) => mysql::Value::Bytes(raw.to_string().into_bytes()),
        })
        .collect();
    Params::Positional(positional)
}

fn decode_rows(rows: &[MysqlRow]) -> ResultSet {
    let columns = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|column| column.name_str().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let decoded = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|index| decode_cell(row.as_ref(index)))
                .collect::<Vec<_>>()
        })
        .collect();

    ResultSet::new(columns, decoded)
}

fn decode_cell(cell: Option<&mysql::Value>) -> Value {
    match cell {
        None | Some(mysql::Value::NULL) => Value::Null,
        Some(mysql::Value::Int(raw)) => Value::Int(*raw),
        Some(mysql::Value::UInt(raw)) => Value::Int(*raw as i64),
        Some(mysql::Value::Float(raw)) => Value::Float(f64::from(*raw)),
        Some(mysql::Value::Double(raw)) => Value::Float(*raw),
        Some(mysql::Value::Bytes(raw)) => Value::Text(String::from_utf8_lossy(raw).to_string()),
        Some(mysql::Value::Date(year, month, day, hour, minute, second, micros)) => {
            match Utc.with_ymd_and_hms(
                i32::from(*year),
                u32::from(*month),
                u32::from(*day),
                u32::from(*hour),
                u32::from(*minute),
                u32::from(*second),
            ) {
                chrono::LocalResult::Single(datetime) => Value::DateTime(
                    datetime + chrono::Duration::microseconds(i64::from(*micros)),
                ),
                _ => Value::Null,
            }
        }
        Some(mysql::Value::Time(negative, days, hours, minutes, seconds, micros)) => {
            let sign = if *negative { "-" } else { "" };
            Value::Text(format!(
                "{sign}{}:{minutes:02}:{seconds:02}.{micros:06}",
                u32::from(*hours) + days * 24
            ))
        }
    }
}
