use std::collections::VecDeque;
use std::sync::Mutex;

use modelql_core::{
    CancelToken, Connection, DriverError, PreparedStatement, ResultSet, Value, redact_args,
};

/// Scripted in-memory stand-in for a live driver. Tests queue result
/// sets, optionally arm a failure on a SQL fragment, and afterwards
/// inspect the statement log and transaction counters.
#[derive(Debug, Default)]
pub struct FakeConnection {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    log: Vec<LogEntry>,
    query_results: VecDeque<ResultSet>,
    fail_on_fragment: Option<(String, String)>,
    last_insert_id: Option<i64>,
    begun: usize,
    committed: usize,
    rolled_back: usize,
    prepared: u64,
    closed_statements: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub sql: String,
    pub args: Vec<Value>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next `query` call. Calls with nothing
    /// queued get an empty result set.
    pub fn push_result(&self, result: ResultSet) {
        self.state.lock().expect("fake state lock").query_results.push_back(result);
    }

    /// Arms a failure: the next statement whose SQL contains
    /// `fragment` fails with `message`.
    pub fn fail_when_sql_contains(&self, fragment: &str, message: &str) {
        self.state.lock().expect("fake state lock").fail_on_fragment =
            Some((fragment.to_string(), message.to_string()));
    }

    pub fn set_last_insert_id(&self, id: i64) {
        self.state.lock().expect("fake state lock").last_insert_id = Some(id);
    }

    pub fn statements(&self) -> Vec<LogEntry> {
        self.state.lock().expect("fake state lock").log.clone()
    }

    pub fn transaction_counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().expect("fake state lock");
        (state.begun, state.committed, state.rolled_back)
    }

    pub fn closed_statements(&self) -> usize {
        self.state.lock().expect("fake state lock").closed_statements
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<(), DriverError> {
        let mut state = self.state.lock().expect("fake state lock");
        state.log.push(LogEntry {
            sql: sql.to_string(),
            args: args.to_vec(),
        });

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
        let mut state = self.state.lock().expect("fake state lock");
        state.prepared += 1;
        Ok(PreparedStatement {
            id: state.prepared,
            sql: sql.to_string(),
        })
    }

    fn close_prepared(&self, _statement: &PreparedStatement) -> Result<(), DriverError> {
        self.state.lock().expect("fake state lock").closed_statements += 1;
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Option<i64>, DriverError> {
        Ok(self.state.lock().expect("fake state lock").last_insert_id)
    }
}
