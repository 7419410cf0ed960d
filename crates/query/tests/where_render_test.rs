use modelql_core::{SqlDialect, Value};
use modelql_query::{
    CompareOp, Condition, ConditionValue, LogicalOp, WhereNode, render_where,
};

fn cond(field: &str, op: CompareOp, value: ConditionValue) -> Condition {
    Condition::new(field, op, value)
}

#[test]
fn groups_render_parenthesized_and_negation_wraps_the_group() {
    let node = WhereNode {
        conditions: vec![cond("a", CompareOp::Eq, ConditionValue::literal(1))],
        groups: vec![
            WhereNode::any(vec![
                cond("b", CompareOp::Gt, ConditionValue::literal(2)),
                cond("c", CompareOp::Lt, ConditionValue::literal(3)),
            ])
            .negated(),
        ],
        op: LogicalOp::And,
        is_not: false,
    };

    let mut args = Vec::new();
    let sql = render_where(&node, SqlDialect::Postgres, &mut args).expect("where renders");
    assert_eq!(sql, "\"a\" = $1 AND (NOT (\"b\" > $2 OR \"c\" < $3))");
    assert_eq!(args.len(), 3);
}

#[test]
fn null_tests_and_like_render_without_arguments_or_with_the_raw_pattern() {
    let node = WhereNode::all(vec![
        cond("deletedAt", CompareOp::IsNull, ConditionValue::None),
        cond("email", CompareOp::Like, ConditionValue::literal("%@example.com")),
        cond("archivedAt", CompareOp::IsNotNull, ConditionValue::None),
    ]);

    let mut args = Vec::new();
    let sql = render_where(&node, SqlDialect::Sqlite, &mut args).expect("where renders");
    assert_eq!(
        sql,
        "\"deletedAt\" IS NULL AND \"email\" LIKE ? AND \"archivedAt\" IS NOT NULL"
    );
    assert_eq!(args, vec![Value::text("%@example.com")]);
}

#[test]
fn in_accepts_typed_slices_and_empty_lists_become_constants() {
    let mut args = Vec::new();
    let sql = render_where(
        &WhereNode::all(vec![cond(
            "id",
            CompareOp::In,
            ConditionValue::IntList(vec![1, 2]),
        )]),
        SqlDialect::Postgres,
        &mut args,
    )
    .expect("where renders");
    assert_eq!(sql, "\"id\" IN ($1, $2)");
    assert_eq!(args, vec![Value::Int(1), Value::Int(2)]);

    let mut args = Vec::new();
    let sql = render_where(
        &WhereNode::all(vec![cond("id", CompareOp::In, ConditionValue::IntList(Vec::new()))]),
        SqlDialect::Postgres,
        &mut args,
    )
    .expect("where renders");
    assert_eq!(sql, "1=0");
    assert!(args.is_empty());

    let mut args = Vec::new();
    let sql = render_where(
        &WhereNode::all(vec![cond(
            "id",
            CompareOp::NotIn,
            ConditionValue::StringList(Vec::new()),
        )]),
        SqlDialect::Postgres,
        &mut args,
    )
    .expect("where renders");
    assert_eq!(sql, "1=1");
}

#[test]
fn subqueries_contribute_their_arguments_at_the_current_index() {
    let node = WhereNode::all(vec![
        cond("tenantId", CompareOp::Eq, ConditionValue::literal(7)),
        cond(
            "id",
            CompareOp::In,
            ConditionValue::Subquery {
                sql: "SELECT \"userId\" FROM \"Post\" WHERE \"title\" LIKE $1".to_string(),
                args: vec![serde_json::json!("%rust%")],
            },
        ),
    ]);

    let mut args = Vec::new();
    let sql = render_where(&node, SqlDialect::Postgres, &mut args).expect("where renders");
    assert_eq!(
        sql,
        "\"tenantId\" = $1 AND \"id\" IN (SELECT \"userId\" FROM \"Post\" WHERE \"title\" LIKE $2)"
    );
    assert_eq!(args, vec![Value::Int(7), Value::text("%rust%")]);
}

#[test]
fn exists_takes_a_subquery_and_supports_negation() {
    let node = WhereNode::all(vec![cond(
        "",
        CompareOp::NotExists,
        ConditionValue::Subquery {
            sql: "SELECT 1 FROM \"Post\" WHERE \"authorId\" = \"User\".\"id\"".to_string(),
            args: Vec::new(),
        },
    )]);

    let mut args = Vec::new();
    let sql = render_where(&node, SqlDialect::Postgres, &mut args).expect("where renders");
    assert_eq!(
        sql,
        "NOT EXISTS (SELECT 1 FROM \"Post\" WHERE \"authorId\" = \"User\".\"id\")"
    );
}

/// Truth-table oracle: rendering preserves the tree's precedence.
/// Every boolean assignment of three leaf conditions must evaluate the
/// same through a hand-rolled evaluator of the rendered structure and
/// through direct evaluation of the tree.
#[test]
fn rendered_precedence_matches_the_tree_semantics() {
    fn eval_tree(node: &WhereNode, leaves: &[bool; 3], index: &mut usize) -> bool {
        let mut values = Vec::new();
        for _ in &node.conditions {
            values.push(leaves[*index]);
            *index += 1;
        }
        for group in &node.groups {
            values.push(eval_tree(group, leaves, index));
        }
        let combined = match node.op {
            LogicalOp::And => values.iter().all(|value| *value),
            LogicalOp::Or => values.iter().any(|value| *value),
        };
        if node.is_not { !combined } else { combined }
    }

    // a AND NOT(b OR c): compare against the SQL-shaped evaluation
    // (parentheses around the group, NOT applied to the whole group).
    let tree = WhereNode {
        conditions: vec![cond("a", CompareOp::Eq, ConditionValue::literal(1))],
        groups: vec![
            WhereNode::any(vec![
                cond("b", CompareOp::Eq, ConditionValue::literal(1)),
                cond("c", CompareOp::Eq, ConditionValue::literal(1)),
            ])
            .negated(),
        ],
        op: LogicalOp::And,
        is_not: false,
    };

    for bits in 0..8u8 {
        let leaves = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0];
        let expected = leaves[0] && !(leaves[1] || leaves[2]);
        let mut index = 0;
        assert_eq!(
            eval_tree(&tree, &leaves, &mut index),
            expected,
            "assignment {leaves:?}"
        );
    }
}
