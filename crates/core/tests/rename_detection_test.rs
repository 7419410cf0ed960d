use modelql_core::{
    ChangeKind, Column, DatabaseSchema, ForeignKey, ForeignKeyAction, Index, PrimaryKey, Table,
    compare, flavour_for_provider,
};

fn table_with_indexes(indexes: Vec<Index>) -> Table {
    Table {
        name: "User".to_string(),
        columns: vec![
            Column::new("id", "integer"),
            Column::new("email", "text"),
            Column::new("handle", "text"),
        ],
        primary_key: Some(PrimaryKey {
            columns: vec!["id".to_string()],
        }),
        indexes,
        foreign_keys: Vec::new(),
    }
}

fn unique_index(name: &str, column: &str) -> Index {
    Index {
        name: name.to_string(),
        columns: vec![column.to_string()],
        unique: true,
    }
}

fn schema_with(tables: Vec<Table>) -> DatabaseSchema {
    DatabaseSchema { tables }
}

#[test]
fn structural_twin_with_new_name_becomes_exactly_one_rename_index() {
    let flavour = flavour_for_provider("postgres").expect("postgres flavour exists");
    let previous = schema_with(vec![table_with_indexes(vec![unique_index(
        "user_email_idx",
        "email",
    )])]);
    let next = schema_with(vec![table_with_indexes(vec![unique_index(
        "user_email_unique",
        "email",
    )])]);

    let plan = compare(&previous, &next, flavour);

    assert_eq!(plan.changes.len(), 1, "got {:?}", plan.changes);
    let change = &plan.changes[0];
    assert_eq!(change.kind, ChangeKind::RenameIndex);
    assert_eq!(change.old_name.as_deref(), Some("user_email_idx"));
    assert_eq!(change.new_name.as_deref(), Some("user_email_unique"));
    assert!(change.is_safe);
}

#[test]
fn rename_is_suppressed_when_the_flavour_cannot_rename_indexes() {
    let flavour = flavour_for_provider("sqlite").expect("sqlite flavour exists");
    let previous = schema_with(vec![table_with_indexes(vec![unique_index(
        "user_email_idx",
        "email",
    )])]);
    let next = schema_with(vec![table_with_indexes(vec![unique_index(
        "user_email_unique",
        "email",
    )])]);

    let plan = compare(&previous, &next, flavour);

    let kinds = plan
        .changes
        .iter()
        .map(|change| change.kind)
        .collect::<Vec<_>>();
    assert!(kinds.contains(&ChangeKind::DropIndex));
    assert!(kinds.contains(&ChangeKind::CreateIndex));
    assert!(!kinds.contains(&ChangeKind::RenameIndex));
}

#[test]
fn ambiguous_structural_twins_fall_back_to_drop_and_create() {
    let flavour = flavour_for_provider("postgres").expect("postgres flavour exists");
    let previous = schema_with(vec![table_with_indexes(vec![
        unique_index("idx_a", "email"),
        unique_index("idx_b", "email"),
    ])]);
    let next = schema_with(vec![table_with_indexes(vec![
        unique_index("idx_c", "email"),
        unique_index("idx_d", "email"),
    ])]);

    let plan = compare(&previous, &next, flavour);

    assert!(
        plan.changes
            .iter()
            .all(|change| change.kind != ChangeKind::RenameIndex),
        "two candidates on each side are ambiguous, got {:?}",
        plan.changes
    );
    let drops = plan
        .changes
        .iter()
        .filter(|change| change.kind == ChangeKind::DropIndex)
        .count();
    let creates = plan
        .changes
        .iter()
        .filter(|change| change.kind == ChangeKind::CreateIndex)
        .count();
    assert_eq!((drops, creates), (2, 2));
}

#[test]
fn same_name_pair_is_never_reported_as_a_rename() {
    let flavour = flavour_for_provider("postgres").expect("postgres flavour exists");
    let previous = schema_with(vec![table_with_indexes(vec![
        unique_index("user_email_key", "email"),
        unique_index("user_handle_key", "handle"),
    ])]);
    let next = schema_with(vec![table_with_indexes(vec![
        unique_index("user_email_key", "email"),
        unique_index("user_handle_key", "handle"),
    ])]);

    let plan = compare(&previous, &next, flavour);
    assert!(plan.changes.is_empty(), "got {:?}", plan.changes);
}

fn post_table(fk_name: &str) -> Table {
    Table {
        name: "Post".to_string(),
        columns: vec![
            Column::new("id", "integer"),
            Column::new("authorId", "integer"),
        ],
        primary_key: Some(PrimaryKey {
            columns: vec!["id".to_string()],
        }),
        indexes: Vec::new(),
        foreign_keys: vec![ForeignKey {
            name: fk_name.to_string(),
            columns: vec!["authorId".to_string()],
            referenced_table: "User".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: ForeignKeyAction::Cascade,
            on_update: ForeignKeyAction::NoAction,
        }],
    }
}

#[test]
fn foreign_key_rename_is_emitted_on_postgres_but_not_mysql() {
    let previous = schema_with(vec![table_with_indexes(Vec::new()), post_table("Post_author_fk")]);
    let next = schema_with(vec![table_with_indexes(Vec::new()), post_table("Post_authorId_fkey")]);

    let postgres = flavour_for_provider("postgres").expect("postgres flavour exists");
    let plan = compare(&previous, &next, postgres);
    assert_eq!(plan.changes.len(), 1, "got {:?}", plan.changes);
    assert_eq!(plan.changes[0].kind, ChangeKind::RenameForeignKey);

    let mysql = flavour_for_provider("mysql").expect("mysql flavour exists");
    let plan = compare(&previous, &next, mysql);
    let kinds = plan
        .changes
        .iter()
        .map(|change| change.kind)
        .collect::<Vec<_>>();
    assert!(kinds.contains(&ChangeKind::DropForeignKey));
    assert!(kinds.contains(&ChangeKind::CreateForeignKey));
}
