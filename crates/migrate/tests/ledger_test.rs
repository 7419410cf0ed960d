mod support;

use modelql_core::{CancelToken, Error, MigrationError, SqlDialect};
use modelql_migrate::{MigrationExecutor, MigrationScript, checksum};

use support::{FakeConnection, empty_ledger, ledger_row};

#[test]
fn ensure_ledger_creates_the_migrations_table_per_dialect() {
    let connection = FakeConnection::new();
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);
    executor.ensure_ledger(&CancelToken::new()).expect("bootstrap succeeds");

    let statements = connection.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS \"_prisma_migrations\""));
    assert!(statements[0].contains("\"migration_name\" TEXT PRIMARY KEY"));

    let connection = FakeConnection::new();
    let executor = MigrationExecutor::new(&connection, SqlDialect::Mysql);
    executor.ensure_ledger(&CancelToken::new()).expect("bootstrap succeeds");
    assert!(connection.statements()[0].contains("`_prisma_migrations`"));
}

#[test]
fn execute_migration_runs_in_a_transaction_and_records_the_ledger_row() {
    let connection = FakeConnection::new();
    connection.push_result(empty_ledger());
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    executor
        .execute_migration(
            "CREATE TABLE \"User\" (\"id\" SERIAL PRIMARY KEY);\nCREATE INDEX \"idx\" ON \"User\" (\"id\");",
            "20240101_init",
            &CancelToken::new(),
        )
        .expect("migration applies");

    let statements = connection.statements();
    assert!(statements.iter().any(|sql| sql.starts_with("CREATE TABLE \"User\"")));
    assert!(statements.iter().any(|sql| sql.starts_with("CREATE INDEX")));
    let insert = statements
        .iter()
        .find(|sql| sql.starts_with("INSERT INTO \"_prisma_migrations\""))
        .expect("ledger row inserted");
    assert!(insert.contains("VALUES ($1, $2, $3)"));

    let (begun, committed, rolled_back) = connection.transaction_counts();
    assert_eq!((begun, committed, rolled_back), (1, 1, 0));
}

#[test]
fn duplicate_migration_names_are_rejected_before_execution() {
    let connection = FakeConnection::new();
    let sql = "CREATE TABLE \"User\" (\"id\" INTEGER)";
    connection.push_result(ledger_row("20240101_init", &checksum(sql)));
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    let error = executor
        .execute_migration(sql, "20240101_init", &CancelToken::new())
        .expect_err("duplicate rejected");
    assert!(matches!(
        error,
        Error::Migration(MigrationError::DuplicateName { .. })
    ));

    // Only the ledger probe ran; no DDL, no transaction.
    let (begun, _, _) = connection.transaction_counts();
    assert_eq!(begun, 0);
    assert!(!connection.statements().iter().any(|sql| sql.starts_with("CREATE TABLE")));
}

#[test]
fn invalid_migration_names_are_rejected() {
    let connection = FakeConnection::new();
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    let error = executor
        .execute_migration("SELECT 1", "bad name!", &CancelToken::new())
        .expect_err("invalid name rejected");
    assert!(matches!(
        error,
        Error::Migration(MigrationError::InvalidName { .. })
    ));
}

#[test]
fn failed_statement_rolls_the_migration_back() {
    let connection = FakeConnection::new();
    connection.push_result(empty_ledger());
    connection.fail_when_sql_contains("CREATE INDEX", "syntax error");
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    executor
        .execute_migration(
            "CREATE TABLE \"User\" (\"id\" INTEGER);\nCREATE INDEX broken;",
            "20240102_broken",
            &CancelToken::new(),
        )
        .expect_err("failure propagates");

    let (begun, committed, rolled_back) = connection.transaction_counts();
    assert_eq!((begun, committed, rolled_back), (1, 0, 1));
}

#[test]
fn batch_application_stops_at_the_first_failure_with_a_report() {
    let connection = FakeConnection::new();
    connection.push_result(empty_ledger());
    connection.push_result(empty_ledger());
    connection.push_result(empty_ledger());
    connection.fail_when_sql_contains("CREATE TABLE \"Broken\"", "no such type");
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    let migrations = vec![
        MigrationScript {
            name: "001_users".to_string(),
            sql: "CREATE TABLE \"User\" (\"id\" INTEGER)".to_string(),
        },
        MigrationScript {
            name: "002_broken".to_string(),
            sql: "CREATE TABLE \"Broken\" (\"id\" NOPE)".to_string(),
        },
        MigrationScript {
            name: "003_posts".to_string(),
            sql: "CREATE TABLE \"Post\" (\"id\" INTEGER)".to_string(),
        },
    ];

    let error = executor
        .apply_all(&migrations, &CancelToken::new())
        .expect_err("batch fails");
    let Error::Migration(MigrationError::BatchFailed {
        applied_count,
        failed_migration,
        ..
    }) = error
    else {
        panic!("expected a batch failure report, got {error}");
    };
    assert_eq!(applied_count, 1);
    assert_eq!(failed_migration, "002_broken");

    // The third migration never ran.
    assert!(!connection.statements().iter().any(|sql| sql.contains("\"Post\"")));
}

#[test]
fn rollback_runs_the_script_and_deletes_the_ledger_row() {
    let connection = FakeConnection::new();
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    executor
        .rollback_migration("DROP TABLE \"User\";", "20240101_init", &CancelToken::new())
        .expect("rollback succeeds");

    let statements = connection.statements();
    assert!(statements.iter().any(|sql| sql.starts_with("DROP TABLE \"User\"")));
    let delete = statements
        .iter()
        .find(|sql| sql.starts_with("DELETE FROM \"_prisma_migrations\""))
        .expect("ledger row deleted");
    assert!(delete.contains("\"migration_name\" = $1"));

    let (begun, committed, _) = connection.transaction_counts();
    assert_eq!((begun, committed), (1, 1));
}

#[test]
fn rollback_sentinel_scripts_only_touch_the_ledger() {
    let connection = FakeConnection::new();
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);

    executor
        .rollback_migration("-- rollback unavailable", "20240101_init", &CancelToken::new())
        .expect("rollback succeeds");

    let statements = connection.statements();
    assert_eq!(statements.len(), 1, "comment-only scripts execute nothing: {statements:?}");
    assert!(statements[0].starts_with("DELETE FROM"));
}

#[test]
fn checksum_verification_detects_drift() {
    let connection = FakeConnection::new();
    let sql = "CREATE TABLE \"User\" (\"id\" INTEGER)";
    connection.push_result(ledger_row("001_users", &checksum(sql)));
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);
    executor
        .verify_checksum(sql, "001_users", &CancelToken::new())
        .expect("matching checksum verifies");

    let connection = FakeConnection::new();
    connection.push_result(ledger_row("001_users", "deadbeef"));
    let executor = MigrationExecutor::new(&connection, SqlDialect::Postgres);
    let error = executor
        .verify_checksum(sql, "001_users", &CancelToken::new())
        .expect_err("drift detected");
    assert!(matches!(
        error,
        Error::Migration(MigrationError::ChecksumMismatch { .. })
    ));
}
