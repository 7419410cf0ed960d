use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls, Row as PgRow, Statement};

use modelql_core::{
    CancelToken, Connection, ConnectionConfig, DriverError, PreparedStatement, ResultSet, Value,
    redact_args,
};

const DEFAULT_HOST: &str = "127.0.0.1";
const CONNECT_SQL: &str = "CONNECT postgres";
const POISONED_CLIENT_MESSAGE: &str = "postgres connection state was poisoned";

pub(crate) struct PostgresAdapter {
    client: Mutex<Client>,
    statements: Mutex<HashMap<String, Statement>>,
    next_statement_id: Mutex<u64>,
}

pub(crate) fn connect(config: &ConnectionConfig) -> Result<Box<dyn Connection>, DriverError> {
    let mut pg_config = postgres::Config::new();

    if let Some(socket) = &config.socket {
        pg_config.host_path(socket);
    } else if let Some(host) = &config.host {
        pg_config.host(host);
    } else {
        pg_config.host(DEFAULT_HOST);
    }
    if let Some(port) = config.port {
        pg_config.port(port);
    }
    if let Some(user) = &config.user {
        pg_config.user(user);
    }
    if let Some(password) = &config.password {
        pg_config.password(password);
    }
    pg_config.dbname(&config.database);

    let client = pg_config
        .connect(NoTls)
        .map_err(|source| DriverError::with_source(CONNECT_SQL, "no args", source))?;

    Ok(Box::new(PostgresAdapter {
        client: Mutex::new(client),
        statements: Mutex::new(HashMap::new()),
        next_statement_id: Mutex::new(0),
    }))
}

impl PostgresAdapter {
    fn lock_client(&self, sql: &str, args: &[Value]) -> Result<MutexGuard<'_, Client>, DriverError> {
        self.client
            .lock()
            .map_err(|_| DriverError::new(sql, redact_args(args), POISONED_CLIENT_MESSAGE))
    }

    fn cached_statement(
        &self,
        client: &mut Client,
        sql: &str,
        args: &[Value],
    ) -> Result<Statement, DriverError> {
        let mut statements = self
            .statements
            .lock()
            .map_err(|_| DriverError::new(sql, redact_args(args), POISONED_CLIENT_MESSAGE))?;
        if let Some(statement) = statements.get(sql) {
            return Ok(statement.clone());
        }

        let statement = client
            .prepare(sql)
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

impl Connection for PostgresAdapter {
    fn execute(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<u64, DriverError> {
        Self::check_cancelled(sql, args, ctx)?;
        let mut client = self.lock_client(sql, args)?;
        let statement = self.cached_statement(&mut client, sql, args)?;
        let params = bind_args(args);
        let param_refs = params
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();
        client
            .execute(&statement, &param_refs)
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))
    }

    fn query(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<ResultSet, DriverError> {
        Self::check_cancelled(sql, args, ctx)?;
        let mut client = self.lock_client(sql, args)?;
        let statement = self.cached_statement(&mut client, sql, args)?;
        let params = bind_args(args);
        let param_refs = params
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();
        let rows = client
            .query(&statement, &param_refs)
            .map_err(|source| DriverError::with_source(sql, redact_args(args), source))?;

        decode_rows(sql, args, &rows)
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
        let mut client = self.lock_client(sql, &[])?;
        self.cached_statement(&mut client, sql, &[])?;
        let mut next_id = self
            .next_statement_id
            .lock()
            .map_err(|_| DriverError::new(sql, "no args", POISONED_CLIENT_MESSAGE))?;
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
            .map_err(|_| DriverError::new(&statement.sql, "no args", POISONED_CLIENT_MESSAGE))?;
        statements.remove(&statement.sql);
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        // Inserted rows come back through RETURNING on this dialect.
        Ok(None)
    }
}

impl PostgresAdapter {
    fn batch(&self, sql: &str) -> Result<(), DriverError> {
        let mut client = self.lock_client(sql, &[])?;
        client
            .batch_execute(sql)
            .map_err(|source| DriverError::with_source(sql, "no args", source))
    }
}

fn bind_args(args: &[Value]) -> Vec<Box<dyn ToSql + Sync>> {
    args.iter()
        .map(|value| -> Box<dyn ToSql + Sync> {
            match value {
                Value::Null => Box::new(Option::<String>::None),
                Value::Bool(raw) => Box::new(*raw),
                Value::Int(raw) => Box::new(*raw),
                Value::Float(raw) => Box::new(*raw),
                Value::Text(raw) => Box::new(raw.clone()),
                Value::Bytes(raw) => Box::new(raw.clone()),
                Value::DateTime(raw) => Box::new(*raw),
                Value::Json(raw) => Box::new(raw.clone()),
            }
        })
        .collect()
}

fn decode_rows(sql: &str, args: &[Value], rows: &[PgRow]) -> Result<ResultSet, DriverError> {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut decoded = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            values.push(decode_cell(sql, args, row, index)?);
        }
        decoded.push(values);
    }

    Ok(ResultSet::new(columns, decoded))
}

fn decode_cell(sql: &str, args: &[Value], row: &PgRow, index: usize) -> Result<Value, DriverError> {
    let column_type = row.columns()[index].type_().clone();

    let value = if column_type == Type::BOOL {
        row.try_get::<_, Option<bool>>(index)
            .map(|cell| cell.map(Value::Bool))
    } else if column_type == Type::INT2 {
        row.try_get::<_, Option<i16>>(index)
            .map(|cell| cell.map(|raw| Value::Int(i64::from(raw))))
    } else if column_type == Type::INT4 {
        row.try_get::<_, Option<i32>>(index)
            .map(|cell| cell.map(|raw| Value::Int(i64::from(raw))))
    } else if column_type == Type::INT8 {
        row.try_get::<_, Option<i64>>(index)
            .map(|cell| cell.map(Value::Int))
    } else if column_type == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(index)
            .map(|cell| cell.map(|raw| Value::Float(f64::from(raw))))
    } else if column_type == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(index)
            .map(|cell| cell.map(Value::Float))
    } else if column_type == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(index)
            .map(|cell| cell.map(Value::Bytes))
    } else if column_type == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(index)
            .map(|cell| cell.map(Value::DateTime))
    } else if column_type == Type::TIMESTAMP {
        row.try_get::<_, Option<chrono::NaiveDateTime>>(index)
            .map(|cell| cell.map(|raw| Value::DateTime(raw.and_utc())))
    } else if column_type == Type::JSON || column_type == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(index)
            .map(|cell| cell.map(Value::Json))
    } else {
        row.try_get::<_, Option<String>>(index)
            .map(|cell| cell.map(Value::Text))
    };

    value
        .map(|cell| cell.unwrap_or(Value::Null))
        .map_err(|source| DriverError::with_source(sql, redact_args(args), source))
}
