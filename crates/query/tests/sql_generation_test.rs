use std::collections::BTreeMap;

use modelql_core::{SqlDialect, Value};
use modelql_query::{
    CompareOp, Condition, ConditionValue, OrderBy, QueryRequest, SortDir, WhereNode, delete,
    insert, select, update, upsert,
};

fn count_placeholders(sql: &str, dialect: SqlDialect) -> usize {
    match dialect {
        SqlDialect::Postgres => (1..)
            .take_while(|index| sql.contains(&format!("${index}")))
            .count(),
        SqlDialect::Mssql => (1..)
            .take_while(|index| sql.contains(&format!("@p{index}")))
            .count(),
        _ => sql.matches('?').count(),
    }
}

fn email_filter() -> WhereNode {
    WhereNode::all(vec![Condition::new(
        "email",
        CompareOp::Eq,
        ConditionValue::literal("a@example.com"),
    )])
}

#[test]
fn select_renders_dialect_quoting_and_placeholders() {
    let request = QueryRequest {
        table: "User".to_string(),
        select: Some(vec!["id".to_string(), "email".to_string()]),
        filter: Some(email_filter()),
        ..QueryRequest::default()
    };

    let pg = select(&request, SqlDialect::Postgres).expect("postgres select");
    assert_eq!(pg.sql, "SELECT \"id\", \"email\" FROM \"User\" WHERE \"email\" = $1");

    let mysql = select(&request, SqlDialect::Mysql).expect("mysql select");
    assert_eq!(mysql.sql, "SELECT `id`, `email` FROM `User` WHERE `email` = ?");

    let mssql = select(&request, SqlDialect::Mssql).expect("mssql select");
    assert_eq!(mssql.sql, "SELECT [id], [email] FROM [User] WHERE [email] = @p1");
}

#[test]
fn placeholder_count_always_matches_args_and_numbering_has_no_gaps() {
    let request = QueryRequest {
        table: "User".to_string(),
        filter: Some(WhereNode {
            conditions: vec![
                Condition::new("email", CompareOp::Eq, ConditionValue::literal("a")),
                Condition::new("id", CompareOp::In, ConditionValue::IntList(vec![1, 2, 3])),
            ],
            groups: vec![WhereNode::any(vec![
                Condition::new("name", CompareOp::Like, ConditionValue::literal("%x%")),
                Condition::new("age", CompareOp::Gte, ConditionValue::literal(21)),
            ])],
            ..WhereNode::default()
        }),
        ..QueryRequest::default()
    };

    for dialect in [SqlDialect::Postgres, SqlDialect::Mysql, SqlDialect::Sqlite, SqlDialect::Mssql] {
        let query = select(&request, dialect).expect("select renders");
        assert_eq!(
            count_placeholders(&query.sql, dialect),
            query.args.len(),
            "dialect {dialect}: {}",
            query.sql
        );
    }
}

#[test]
fn offset_without_limit_uses_the_mysql_sentinel() {
    let request = QueryRequest {
        table: "User".to_string(),
        offset: Some(10),
        ..QueryRequest::default()
    };

    let mysql = select(&request, SqlDialect::Mysql).expect("mysql select");
    assert!(mysql.sql.ends_with("LIMIT 18446744073709551615 OFFSET 10"), "{}", mysql.sql);

    let pg = select(&request, SqlDialect::Postgres).expect("postgres select");
    assert!(pg.sql.ends_with("OFFSET 10"), "{}", pg.sql);
    assert!(!pg.sql.contains("LIMIT"), "{}", pg.sql);
}

#[test]
fn mssql_pagination_requires_an_order_by_clause() {
    let request = QueryRequest {
        table: "User".to_string(),
        limit: Some(5),
        offset: Some(10),
        ..QueryRequest::default()
    };

    let query = select(&request, SqlDialect::Mssql).expect("mssql select");
    assert!(
        query
            .sql
            .ends_with("ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"),
        "{}",
        query.sql
    );

    let ordered = QueryRequest {
        order_by: Some(vec![OrderBy {
            field: "id".to_string(),
            dir: SortDir::Desc,
        }]),
        ..request
    };
    let query = select(&ordered, SqlDialect::Mssql).expect("mssql select");
    assert!(
        query.sql.ends_with("ORDER BY [id] DESC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"),
        "{}",
        query.sql
    );
}

fn user_row() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("email".to_string(), Value::text("a@example.com")),
        ("name".to_string(), Value::text("Alice")),
    ])
}

#[test]
fn insert_returns_rows_where_the_dialect_can() {
    let pg = insert("User", &user_row(), SqlDialect::Postgres).expect("postgres insert");
    assert_eq!(
        pg.sql,
        "INSERT INTO \"User\" (\"email\", \"name\") VALUES ($1, $2) RETURNING *"
    );
    assert_eq!(pg.args.len(), 2);

    let mssql = insert("User", &user_row(), SqlDialect::Mssql).expect("mssql insert");
    assert_eq!(
        mssql.sql,
        "INSERT INTO [User] ([email], [name]) OUTPUT INSERTED.* VALUES (@p1, @p2)"
    );

    let mysql = insert("User", &user_row(), SqlDialect::Mysql).expect("mysql insert");
    assert_eq!(mysql.sql, "INSERT INTO `User` (`email`, `name`) VALUES (?, ?)");
}

#[test]
fn upsert_takes_the_dialect_specific_form() {
    let target = vec!["email".to_string()];
    let update_columns = vec!["name".to_string()];

    let pg = upsert("User", &user_row(), &target, &update_columns, SqlDialect::Postgres)
        .expect("postgres upsert");
    assert_eq!(
        pg.sql,
        "INSERT INTO \"User\" (\"email\", \"name\") VALUES ($1, $2) \
         ON CONFLICT (\"email\") DO UPDATE SET \"name\" = EXCLUDED.\"name\" RETURNING *"
    );

    let sqlite = upsert("User", &user_row(), &target, &update_columns, SqlDialect::Sqlite)
        .expect("sqlite upsert");
    assert_eq!(
        sqlite.sql,
        "INSERT INTO \"User\" (\"email\", \"name\") VALUES (?, ?) \
         ON CONFLICT (\"email\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""
    );

    let mysql = upsert("User", &user_row(), &target, &update_columns, SqlDialect::Mysql)
        .expect("mysql upsert");
    assert_eq!(
        mysql.sql,
        "INSERT INTO `User` (`email`, `name`) VALUES (?, ?) \
         ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
    );

    let mssql = upsert("User", &user_row(), &target, &update_columns, SqlDialect::Mssql)
        .expect("mssql upsert");
    assert!(mssql.sql.starts_with("MERGE INTO [User] AS target"), "{}", mssql.sql);
    assert!(mssql.sql.contains("WHEN MATCHED THEN UPDATE SET target.[name] = source.[name]"));
    assert!(mssql.sql.contains("WHEN NOT MATCHED THEN INSERT"));
}

#[test]
fn composite_conflict_targets_bind_every_column() {
    let target = vec!["tenantId".to_string(), "email".to_string()];
    let pg = upsert("User", &user_row(), &target, &[], SqlDialect::Postgres)
        .expect("postgres upsert");
    assert!(pg.sql.contains("ON CONFLICT (\"tenantId\", \"email\") DO NOTHING"), "{}", pg.sql);

    let mssql = upsert("User", &user_row(), &target, &[], SqlDialect::Mssql).expect("mssql upsert");
    assert!(
        mssql.sql.contains("ON target.[tenantId] = source.[tenantId] AND target.[email] = source.[email]"),
        "{}",
        mssql.sql
    );
}

#[test]
fn update_binds_assignments_before_filter_arguments() {
    let query = update(
        "User",
        &BTreeMap::from([("name".to_string(), Value::text("Bob"))]),
        Some(&email_filter()),
        SqlDialect::Postgres,
    )
    .expect("update renders");

    assert_eq!(query.sql, "UPDATE \"User\" SET \"name\" = $1 WHERE \"email\" = $2");
    assert_eq!(query.args, vec![Value::text("Bob"), Value::text("a@example.com")]);
}

#[test]
fn delete_without_a_filter_gets_the_guard_clause() {
    let query = delete("User", None, SqlDialect::Postgres).expect("delete renders");
    assert_eq!(query.sql, "DELETE FROM \"User\" WHERE 1=0");

    let filtered = delete("User", Some(&email_filter()), SqlDialect::Postgres).expect("delete renders");
    assert_eq!(filtered.sql, "DELETE FROM \"User\" WHERE \"email\" = $1");
}

#[test]
fn update_without_a_filter_gets_the_guard_clause() {
    let query = update(
        "User",
        &BTreeMap::from([("name".to_string(), Value::text("Bob"))]),
        None,
        SqlDialect::Postgres,
    )
    .expect("update renders");
    assert_eq!(query.sql, "UPDATE \"User\" SET \"name\" = $1 WHERE 1=0");
}
