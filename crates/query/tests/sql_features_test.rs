use modelql_core::{SqlDialect, Value};
use modelql_query::{
    Aggregate, AggregateFunc, Aggregation, CommonTableExpression, CompareOp, Condition,
    ConditionValue, JsonFilter, JsonFilterKind, MongoCommand, OrderBy, QueryRequest, SortDir,
    SqlQuery, WhereNode, WindowFunction, aggregate, mongo_find, render_where, select_with_cte,
    select_with_windows, supports_window_functions,
};

fn request_with_filter(filter: WhereNode) -> QueryRequest {
    QueryRequest {
        table: "Order".to_string(),
        filter: Some(filter),
        ..QueryRequest::default()
    }
}

#[test]
fn aggregate_renders_group_by_with_aliases() {
    let spec = Aggregate {
        aggregations: vec![
            Aggregation {
                func: AggregateFunc::Count,
                field: None,
                alias: "orders".to_string(),
            },
            Aggregation {
                func: AggregateFunc::Sum,
                field: Some("total".to_string()),
                alias: "revenue".to_string(),
            },
        ],
        group_by: vec!["customerId".to_string()],
    };

    let query = aggregate(&QueryRequest::table("Order"), &spec, SqlDialect::Postgres)
        .expect("aggregate renders");
    assert_eq!(
        query.sql,
        "SELECT \"customerId\", COUNT(*) AS \"orders\", SUM(\"total\") AS \"revenue\" \
         FROM \"Order\" GROUP BY \"customerId\""
    );
}

#[test]
fn cte_splicing_renumbers_the_argument_sequence() {
    let cte = CommonTableExpression {
        name: "big_orders".to_string(),
        query: SqlQuery::new(
            "SELECT * FROM \"Order\" WHERE \"total\" > $1",
            vec![Value::Int(100)],
        ),
    };
    let main = SqlQuery::new(
        "SELECT * FROM \"big_orders\" WHERE \"customerId\" = $1",
        vec![Value::Int(7)],
    );

    let query = select_with_cte(&[cte], main, SqlDialect::Postgres).expect("cte renders");
    assert_eq!(
        query.sql,
        "WITH \"big_orders\" AS (SELECT * FROM \"Order\" WHERE \"total\" > $1) \
         SELECT * FROM \"big_orders\" WHERE \"customerId\" = $2"
    );
    assert_eq!(query.args, vec![Value::Int(100), Value::Int(7)]);
}

#[test]
fn window_functions_render_partition_and_order() {
    let windows = vec![WindowFunction {
        call: "ROW_NUMBER()".to_string(),
        partition_by: vec!["customerId".to_string()],
        order_by: vec![OrderBy {
            field: "total".to_string(),
            dir: SortDir::Desc,
        }],
        alias: "rank".to_string(),
    }];

    let query = select_with_windows(&QueryRequest::table("Order"), &windows, SqlDialect::Postgres)
        .expect("window renders");
    assert_eq!(
        query.sql,
        "SELECT *, ROW_NUMBER() OVER (PARTITION BY \"customerId\" ORDER BY \"total\" DESC) \
         AS \"rank\" FROM \"Order\""
    );
}

#[test]
fn window_support_tracks_server_versions() {
    assert!(supports_window_functions(SqlDialect::Postgres, 13, 0));
    assert!(supports_window_functions(SqlDialect::Mysql, 8, 0));
    assert!(!supports_window_functions(SqlDialect::Mysql, 5, 7));
    assert!(supports_window_functions(SqlDialect::Sqlite, 3, 25));
    assert!(!supports_window_functions(SqlDialect::Sqlite, 3, 24));
}

fn json_condition(kind: JsonFilterKind, path: &[&str], value: serde_json::Value) -> WhereNode {
    WhereNode::all(vec![Condition {
        field: "meta".to_string(),
        op: CompareOp::Eq,
        value: ConditionValue::Literal(value),
        json: Some(JsonFilter {
            kind,
            path: path.iter().map(|segment| segment.to_string()).collect(),
        }),
    }])
}

#[test]
fn json_path_filters_dispatch_per_dialect() {
    let node = json_condition(JsonFilterKind::Path, &["address", "city"], serde_json::json!("Berlin"));

    let mut args = Vec::new();
    let pg = render_where(&node, SqlDialect::Postgres, &mut args).expect("pg renders");
    assert_eq!(pg, "\"meta\"->'address'->>'city' = $1");

    let mut args = Vec::new();
    let mysql = render_where(&node, SqlDialect::Mysql, &mut args).expect("mysql renders");
    assert_eq!(
        mysql,
        "JSON_UNQUOTE(JSON_EXTRACT(`meta`, '$.address.city')) = ?"
    );

    let mut args = Vec::new();
    let sqlite = render_where(&node, SqlDialect::Sqlite, &mut args).expect("sqlite renders");
    assert_eq!(sqlite, "json_extract(\"meta\", '$.address.city') = ?");
}

#[test]
fn json_containment_and_key_filters_use_dialect_operators() {
    let contains = json_condition(JsonFilterKind::Contains, &[], serde_json::json!({"a": 1}));
    let mut args = Vec::new();
    let pg = render_where(&contains, SqlDialect::Postgres, &mut args).expect("pg renders");
    assert_eq!(pg, "\"meta\" @> $1");
    assert_eq!(args, vec![Value::text("{\"a\":1}")]);

    let has_key = json_condition(JsonFilterKind::HasKey, &["tags"], serde_json::json!(null));
    let mut args = Vec::new();
    let mysql = render_where(&has_key, SqlDialect::Mysql, &mut args).expect("mysql renders");
    assert_eq!(mysql, "JSON_CONTAINS_PATH(`meta`, 'one', '$.tags')");
    assert!(args.is_empty());
}

#[test]
fn mongo_requests_become_command_descriptors() {
    let request = QueryRequest {
        table: "users".to_string(),
        select: Some(vec!["email".to_string()]),
        filter: Some(WhereNode::all(vec![Condition::new(
            "age",
            CompareOp::Gte,
            ConditionValue::literal(21),
        )])),
        order_by: Some(vec![OrderBy {
            field: "email".to_string(),
            dir: SortDir::Asc,
        }]),
        limit: Some(10),
        offset: Some(5),
        ..QueryRequest::default()
    };

    let command = mongo_find(&request).expect("descriptor builds");
    let MongoCommand::Find {
        collection,
        filter,
        projection,
        sort,
        limit,
        skip,
    } = command
    else {
        panic!("expected a find descriptor");
    };

    assert_eq!(collection, "users");
    assert_eq!(filter, serde_json::json!({ "age": { "$gte": 21 } }));
    assert_eq!(projection, Some(serde_json::json!({ "email": 1 })));
    assert_eq!(sort, Some(serde_json::json!({ "email": 1 })));
    assert_eq!((limit, skip), (Some(10), Some(5)));
}

#[test]
fn like_patterns_translate_to_anchored_regex_filters() {
    let request = request_with_filter(WhereNode::all(vec![Condition::new(
        "email",
        CompareOp::Like,
        ConditionValue::literal("%@example.com"),
    )]));

    let MongoCommand::Find { filter, .. } = mongo_find(&request).expect("descriptor builds") else {
        panic!("expected a find descriptor");
    };
    assert_eq!(
        filter,
        serde_json::json!({ "email": { "$regex": "^.*@example\\.com$" } })
    );
}
