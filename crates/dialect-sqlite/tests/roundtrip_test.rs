use std::collections::BTreeMap;

use modelql_core::{
    CancelToken, Column, ConnectionConfig, Connector, DatabaseSchema, ForeignKey,
    ForeignKeyAction, Index, PrimaryKey, Table, Value, compare, flavour_for_provider,
};
use modelql_dialect_sqlite::SqliteConnector;

fn blog_schema() -> DatabaseSchema {
    DatabaseSchema {
        tables: vec![
            Table {
                name: "User".to_string(),
                columns: vec![
                    Column::new("id", "INTEGER").auto_increment(true),
                    Column::new("email", "TEXT"),
                    Column::new("name", "TEXT").nullable(true),
                ],
                primary_key: Some(PrimaryKey {
                    columns: vec!["id".to_string()],
                }),
                indexes: vec![Index {
                    name: "User_email_key".to_string(),
                    columns: vec!["email".to_string()],
                    unique: true,
                }],
                foreign_keys: Vec::new(),
            },
            Table {
                name: "Post".to_string(),
                columns: vec![
                    Column::new("id", "INTEGER").auto_increment(true),
                    Column::new("title", "TEXT"),
                    Column::new("authorId", "INTEGER"),
                ],
                primary_key: Some(PrimaryKey {
                    columns: vec!["id".to_string()],
                }),
                indexes: vec![Index {
                    name: "Post_authorId_idx".to_string(),
                    columns: vec!["authorId".to_string()],
                    unique: false,
                }],
                foreign_keys: vec![ForeignKey {
                    name: "Post_fk_0".to_string(),
                    columns: vec!["authorId".to_string()],
                    referenced_table: "User".to_string(),
                    referenced_columns: vec!["id".to_string()],
                    on_delete: ForeignKeyAction::Cascade,
                    on_update: ForeignKeyAction::NoAction,
                }],
            },
        ],
    }
}

fn temp_connection(connector: &SqliteConnector, directory: &tempfile::TempDir) -> Box<dyn modelql_core::Connection> {
    let config = ConnectionConfig {
        database: directory
            .path()
            .join("roundtrip.db")
            .display()
            .to_string(),
        ..ConnectionConfig::default()
    };
    connector.connect(&config).expect("sqlite opens")
}

#[test]
fn applying_the_generated_ddl_and_introspecting_reaches_a_fixed_point() {
    let connector = SqliteConnector;
    let flavour = flavour_for_provider("sqlite").expect("sqlite flavour exists");
    let directory = tempfile::tempdir().expect("temp dir");
    let connection = temp_connection(&connector, &directory);
    let ctx = CancelToken::new();

    let target = blog_schema();
    target.validate().expect("fixture is well formed");

    let plan = compare(&DatabaseSchema::default(), &target, flavour);
    let script = connector
        .render_migration(&plan, &target)
        .expect("migration renders");
    for statement in &script.statements {
        connection
            .execute(&statement.sql, &[], &ctx)
            .unwrap_or_else(|error| panic!("`{}` applies: {error}", statement.sql));
    }

    let described = connector
        .describe_schema(connection.as_ref(), &ctx)
        .expect("introspection succeeds");

    let drift = compare(&target, &described, flavour);
    assert!(
        drift.changes.is_empty(),
        "introspected schema drifted: {:#?}",
        drift.changes
    );
}

#[test]
fn introspection_reads_real_rows_back_through_the_adapter() {
    let connector = SqliteConnector;
    let directory = tempfile::tempdir().expect("temp dir");
    let connection = temp_connection(&connector, &directory);
    let ctx = CancelToken::new();

    connection
        .execute(
            "CREATE TABLE \"Item\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"label\" TEXT NOT NULL, \"done\" BOOLEAN NOT NULL DEFAULT 0)",
            &[],
            &ctx,
        )
        .expect("create succeeds");

    connection
        .execute(
            "INSERT INTO \"Item\" (\"label\", \"done\") VALUES (?, ?)",
            &[Value::text("write tests"), Value::Bool(true)],
            &ctx,
        )
        .expect("insert succeeds");
    let last_id = connection
        .last_insert_id()
        .expect("rowid available")
        .expect("one row inserted");
    assert_eq!(last_id, 1);

    let result = connection
        .query("SELECT * FROM \"Item\"", &[], &ctx)
        .expect("select succeeds");
    assert_eq!(result.len(), 1);
    let row: BTreeMap<_, _> = result
        .columns
        .iter()
        .cloned()
        .zip(result.rows[0].iter().cloned())
        .collect();
    assert_eq!(row.get("label"), Some(&Value::text("write tests")));
    // Booleans come back as their INTEGER storage class; the query
    // executor's scanner converts them per field descriptor.
    assert_eq!(row.get("done"), Some(&Value::Int(1)));
}

#[test]
fn cancellation_aborts_before_the_driver_call() {
    let connector = SqliteConnector;
    let directory = tempfile::tempdir().expect("temp dir");
    let connection = temp_connection(&connector, &directory);

    let ctx = CancelToken::new();
    ctx.cancel();
    connection
        .execute("SELECT 1", &[], &ctx)
        .expect_err("cancelled call fails");
}
