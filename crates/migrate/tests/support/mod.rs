#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use modelql_core::{
    CancelToken, Connection, DriverError, PreparedStatement, ResultSet, Value, redact_args,
};

/// Scripted driver stand-in: queues query results, optionally fails on
/// a SQL fragment, and logs every statement with transaction counters.
#[derive(Debug, Default)]
pub struct FakeConnection {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<String>,
    query_results: VecDeque<ResultSet>,
    fail_on_fragment: Option<(String, String)>,
    begun: usize,
    committed: usize,
    rolled_back: usize,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: ResultSet) {
        self.state
            .lock()
            .expect("fake state lock")
            .query_results
            .push_back(result);
    }

    pub fn fail_when_sql_contains(&self, fragment: &str, message: &str) {
        self.state.lock().expect("fake state lock").fail_on_fragment =
            Some((fragment.to_string(), message.to_string()));
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().expect("fake state lock").log.clone()
    }

    pub fn transaction_counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().expect("fake state lock");
        (state.begun, state.committed, state.rolled_back)
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<(), DriverError> {
        let mut state = self.state.lock().expect("fake state lock");
        state.log.push(sql.to_string());
        if let Some((fragment, message)) = &state.fail_on_fragment
            && sql.contains(fragment.as_str())
        {
            let error = DriverError::new(sql, redact_args(args), message.clone());
            state.fail_on_fragment = None;
            return Err(error);
        }
        Ok(())
    }
}

impl Connection for FakeConnection {
    fn execute(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<u64, DriverError> {
        if ctx.is_cancelled() {
            return Err(DriverError::new(sql, redact_args(args), "cancelled"));
        }
        self.record(sql, args)?;
        Ok(1)
    }

    fn query(&self, sql: &str, args: &[Value], ctx: &CancelToken) -> Result<ResultSet, DriverError> {
        if ctx.is_cancelled() {
            return Err(DriverError::new(sql, redact_args(args), "cancelled"));
        }
        self.record(sql, args)?;
        Ok(self
            .state
            .lock()
            .expect("fake state lock")
            .query_results
            .pop_front()
            .unwrap_or_default())
    }

    fn begin(&self) -> Result<(), DriverError> {
        self.state.lock().expect("fake state lock").begun += 1;
        Ok(())
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.state.lock().expect("fake state lock").committed += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.state.lock().expect("fake state lock").rolled_back += 1;
        Ok(())
    }

    fn prepare(&self, sql: &str) -> Result<PreparedStatement, DriverError> {
        Ok(PreparedStatement {
            id: 1,
            sql: sql.to_string(),
        })
    }

    fn close_prepared(&self, _statement: &PreparedStatement) -> Result<(), DriverError> {
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        Ok(None)
    }
}

pub fn ledger_row(name: &str, checksum: &str) -> ResultSet {
    ResultSet::new(
        vec![
            "migration_name".to_string(),
            "applied_at".to_string(),
            "checksum".to_string(),
        ],
        vec![vec![
            Value::text(name),
            Value::text("2024-01-01T00:00:00Z"),
            Value::text(checksum),
        ]],
    )
}

pub fn empty_ledger() -> ResultSet {
    ResultSet::new(
        vec![
            "migration_name".to_string(),
            "applied_at".to_string(),
            "checksum".to_string(),
        ],
        Vec::new(),
    )
}
