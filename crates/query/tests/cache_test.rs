mod support;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use modelql_core::{CancelToken, Connection, ResultSet, SqlDialect, Value};
use modelql_query::{Executor, QueryRequest, WriteRequest};

use support::{FakeConnection, blog_registry, int, text};

fn user_result() -> ResultSet {
    ResultSet::new(
        vec![
            "id".to_string(),
            "email".to_string(),
            "active".to_string(),
            "createdAt".to_string(),
        ],
        vec![vec![int(1), text("a@x.com"), Value::Bool(true), Value::Null]],
    )
}

#[test]
fn repeated_reads_reuse_the_prepared_statement() {
    let connection = Arc::new(FakeConnection::new());
    connection.push_result(user_result());
    connection.push_result(user_result());
    let connection_handle: Arc<dyn Connection> = connection.clone();
    let executor = Executor::new(connection_handle, SqlDialect::Postgres, blog_registry());

    let request = QueryRequest::table("User");
    executor.find_many(&request, &CancelToken::new()).expect("first read");
    executor.find_many(&request, &CancelToken::new()).expect("second read");

    assert_eq!(executor.statement_cache().len(), 1);
}

#[test]
fn clearing_the_statement_cache_closes_every_statement() {
    let connection = Arc::new(FakeConnection::new());
    connection.push_result(user_result());
    let connection_handle: Arc<dyn Connection> = connection.clone();
    let executor = Executor::new(connection_handle, SqlDialect::Postgres, blog_registry());

    executor
        .find_many(&QueryRequest::table("User"), &CancelToken::new())
        .expect("read succeeds");
    assert_eq!(executor.statement_cache().len(), 1);

    executor.clear_statement_cache().expect("clear succeeds");
    assert_eq!(executor.statement_cache().len(), 0);
    assert_eq!(connection.closed_statements(), 1);
}

#[test]
fn result_cache_returns_copies_and_writes_invalidate_by_table() {
    let connection = Arc::new(FakeConnection::new());
    connection.push_result(user_result());
    let connection_handle: Arc<dyn Connection> = connection.clone();
    let executor = Executor::new(connection_handle, SqlDialect::Postgres, blog_registry())
        .with_result_cache(NonZeroUsize::new(16).expect("capacity"));

    let request = QueryRequest::table("User");
    let first = executor.find_many(&request, &CancelToken::new()).expect("first read");
    assert_eq!(first.len(), 1);

    // Nothing further is queued: a driver round-trip would come back
    // empty, so getting the same row proves the cache answered.
    let second = executor.find_many(&request, &CancelToken::new()).expect("second read");
    assert_eq!(first, second);

    let write = WriteRequest::create(
        "User",
        BTreeMap::from([("email".to_string(), text("c@x.com"))]),
    );
    connection.push_result(user_result());
    executor.write(&write, &CancelToken::new()).expect("write succeeds");

    // The cache entry for the User read is gone; the next read hits
    // the (empty) driver again.
    let third = executor.find_many(&request, &CancelToken::new()).expect("third read");
    assert!(third.is_empty());
}

#[test]
fn result_cache_is_disabled_by_default() {
    let connection = Arc::new(FakeConnection::new());
    connection.push_result(user_result());
    let connection_handle: Arc<dyn Connection> = connection.clone();
    let executor = Executor::new(connection_handle, SqlDialect::Postgres, blog_registry());

    let request = QueryRequest::table("User");
    let first = executor.find_many(&request, &CancelToken::new()).expect("first read");
    assert_eq!(first.len(), 1);

    let second = executor.find_many(&request, &CancelToken::new()).expect("second read");
    assert!(second.is_empty(), "no cache: the driver answered with nothing");
}
