mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use modelql_core::{CancelToken, ResultSet, SqlDialect, Value};
use modelql_query::{
    Executor, FieldKind, Include, QueryRequest, RelationValue, convert_cell, parse_datetime,
    plan_joins,
};

use support::{FakeConnection, blog_registry, field, int, text};

fn include(name: &str) -> BTreeMap<String, Include> {
    BTreeMap::from([(name.to_string(), Include::Flag(true))])
}

#[test]
fn include_with_one_to_many_renders_the_expected_left_join() {
    let registry = blog_registry();
    let plan = plan_joins(&registry, "User", &include("posts")).expect("plan builds");

    let request = QueryRequest::table("User");
    let query =
        modelql_query::select_with_joins(&request, &plan.joins, SqlDialect::Postgres).expect("sql");
    assert!(
        query
            .sql
            .contains("LEFT JOIN \"Post\" AS \"posts\" ON \"posts\".\"authorId\" = \"User\".\"id\""),
        "{}",
        query.sql
    );
}

#[test]
fn grouped_scan_builds_n_parents_with_k_unique_children() {
    let registry = blog_registry();
    let connection = Arc::new(FakeConnection::new());

    // Two users; user 1 has three posts (one duplicated by the join),
    // user 2 has none (NULL child columns from the LEFT JOIN).
    let columns = vec![
        "id".to_string(),
        "email".to_string(),
        "active".to_string(),
        "createdAt".to_string(),
        "posts_id".to_string(),
        "posts_title".to_string(),
        "posts_authorId".to_string(),
    ];
    let rows = vec![
        vec![int(1), text("a@x.com"), Value::Bool(true), Value::Null, int(10), text("first"), int(1)],
        vec![int(1), text("a@x.com"), Value::Bool(true), Value::Null, int(11), text("second"), int(1)],
        vec![int(1), text("a@x.com"), Value::Bool(true), Value::Null, int(11), text("second"), int(1)],
        vec![int(1), text("a@x.com"), Value::Bool(true), Value::Null, int(12), text("third"), int(1)],
        vec![int(2), text("b@x.com"), Value::Bool(false), Value::Null, Value::Null, Value::Null, Value::Null],
    ];
    connection.push_result(ResultSet::new(columns, rows));

    let executor = Executor::new(connection, SqlDialect::Postgres, registry);
    let request = QueryRequest {
        table: "User".to_string(),
        include: Some(include("posts")),
        ..QueryRequest::default()
    };

    let records = executor
        .find_many(&request, &CancelToken::new())
        .expect("read succeeds");

    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.get("id"), Some(&Value::Int(1)));
    let posts = first
        .relation("posts")
        .and_then(RelationValue::as_many)
        .expect("posts is a collection");
    assert_eq!(posts.len(), 3, "children deduplicate by primary key");
    assert_eq!(posts[0].get("title"), Some(&Value::text("first")));

    let second = &records[1];
    let empty = second
        .relation("posts")
        .and_then(RelationValue::as_many)
        .expect("included collection is concrete even when empty");
    assert!(empty.is_empty());
}

#[test]
fn to_one_include_scans_flat_with_prefixed_columns() {
    let registry = blog_registry();
    let connection = Arc::new(FakeConnection::new());

    let columns = vec![
        "id".to_string(),
        "title".to_string(),
        "authorId".to_string(),
        "author_id".to_string(),
        "author_email".to_string(),
        "author_active".to_string(),
        "author_createdAt".to_string(),
    ];
    let rows = vec![vec![
        int(10),
        text("hello"),
        int(1),
        int(1),
        text("a@x.com"),
        Value::Bool(true),
        Value::Null,
    ]];
    connection.push_result(ResultSet::new(columns, rows));

    let executor = Executor::new(connection, SqlDialect::Postgres, registry);
    let request = QueryRequest {
        table: "Post".to_string(),
        include: Some(include("author")),
        ..QueryRequest::default()
    };

    let records = executor
        .find_many(&request, &CancelToken::new())
        .expect("read succeeds");

    assert_eq!(records.len(), 1);
    let author = records[0]
        .relation("author")
        .and_then(RelationValue::as_one)
        .expect("author is present");
    assert_eq!(author.get("email"), Some(&Value::text("a@x.com")));
}

#[test]
fn sqlite_integers_convert_to_booleans_for_boolean_fields() {
    let bool_field = field("active", FieldKind::Bool, false);
    assert_eq!(
        convert_cell(Value::Int(1), &bool_field, "active").expect("converts"),
        Value::Bool(true)
    );
    assert_eq!(
        convert_cell(Value::Int(0), &bool_field, "active").expect("converts"),
        Value::Bool(false)
    );
}

#[test]
fn datetime_text_parses_through_the_cascade() {
    for raw in [
        "2024-03-01T10:30:00.123456789+02:00",
        "2024-03-01T10:30:00Z",
        "2024-03-01 10:30:00.500",
        "2024-03-01T10:30:00",
        "2024-03-01 10:30:00+00:00",
    ] {
        parse_datetime(raw, "createdAt").unwrap_or_else(|error| {
            panic!("`{raw}` should parse: {error}");
        });
    }

    parse_datetime("not a date", "createdAt").expect_err("garbage must fail with a typed error");
}

#[test]
fn null_scalars_stay_null_and_mismatches_are_typed_errors() {
    let datetime_field = field("createdAt", FieldKind::DateTime, true);
    assert_eq!(
        convert_cell(Value::Null, &datetime_field, "createdAt").expect("null passes"),
        Value::Null
    );

    let int_field = field("id", FieldKind::Int, false);
    convert_cell(Value::text("oops"), &int_field, "id").expect_err("text into int must fail");
}
