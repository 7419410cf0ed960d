use modelql_core::{
    ChangeKind, Column, DatabaseSchema, DefaultValue, Index, PrimaryKey, Table, compare,
    flavour_for_provider,
};

fn postgres() -> &'static dyn modelql_core::Flavour {
    flavour_for_provider("postgres").expect("postgres flavour exists")
}

fn user_table() -> Table {
    Table {
        name: "User".to_string(),
        columns: vec![
            Column::new("id", "integer").auto_increment(true),
            Column::new("email", "text"),
            Column::new("name", "text").nullable(true),
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
    }
}

fn schema_with(tables: Vec<Table>) -> DatabaseSchema {
    DatabaseSchema { tables }
}

#[test]
fn comparing_a_schema_with_itself_yields_no_changes() {
    for provider in ["postgres", "mysql", "sqlite"] {
        let flavour = flavour_for_provider(provider).expect("supported provider");
        let schema = schema_with(vec![user_table()]);
        let plan = compare(&schema, &schema, flavour);
        assert!(
            plan.changes.is_empty(),
            "self-diff on {provider} produced {:?}",
            plan.changes
        );
    }
}

#[test]
fn table_only_in_next_produces_create_table() {
    let plan = compare(
        &DatabaseSchema::default(),
        &schema_with(vec![user_table()]),
        postgres(),
    );

    assert_eq!(plan.tables_to_create.len(), 1);
    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::CreateTable);
    assert_eq!(plan.changes[0].table, "User");
    assert!(plan.changes[0].is_safe);
}

#[test]
fn table_only_in_previous_produces_unsafe_drop_table() {
    let plan = compare(
        &schema_with(vec![user_table()]),
        &DatabaseSchema::default(),
        postgres(),
    );

    assert_eq!(plan.tables_to_drop.len(), 1);
    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::DropTable);
    assert!(!plan.changes[0].is_safe);
    assert!(!plan.changes[0].warnings.is_empty());
}

#[test]
fn added_nullable_column_is_a_safe_add_column() {
    let mut next_table = user_table();
    next_table
        .columns
        .push(Column::new("bio", "text").nullable(true));

    let plan = compare(
        &schema_with(vec![user_table()]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert_eq!(plan.changes.len(), 1);
    let change = &plan.changes[0];
    assert_eq!(change.kind, ChangeKind::AddColumn);
    assert_eq!(change.column.as_deref(), Some("bio"));
    assert!(change.is_safe);
}

#[test]
fn added_required_column_without_default_is_unsafe() {
    let mut next_table = user_table();
    next_table.columns.push(Column::new("age", "integer"));

    let plan = compare(
        &schema_with(vec![user_table()]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::AddColumn);
    assert!(!plan.changes[0].is_safe);
}

#[test]
fn dropped_column_is_unsafe_and_carries_old_metadata() {
    let mut next_table = user_table();
    next_table.columns.retain(|column| column.name != "name");

    let plan = compare(
        &schema_with(vec![user_table()]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert_eq!(plan.changes.len(), 1);
    let change = &plan.changes[0];
    assert_eq!(change.kind, ChangeKind::DropColumn);
    assert!(!change.is_safe);
    let metadata = change.column_metadata.as_ref().expect("drop carries shape");
    assert_eq!(metadata.tpe, "text");
    assert!(metadata.nullable);
}

#[test]
fn tightened_nullability_is_an_unsafe_alter_column() {
    let mut next_table = user_table();
    next_table
        .columns
        .iter_mut()
        .find(|column| column.name == "name")
        .expect("name column exists")
        .nullable = false;

    let plan = compare(
        &schema_with(vec![user_table()]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert_eq!(plan.changes.len(), 1);
    let change = &plan.changes[0];
    assert_eq!(change.kind, ChangeKind::AlterColumn);
    assert!(!change.is_safe);
    let metadata = change.column_metadata.as_ref().expect("alter carries shape");
    assert_eq!(metadata.old_nullable, Some(true));
    assert!(!metadata.nullable);
}

#[test]
fn loosened_nullability_is_a_safe_alter_column() {
    let mut previous_table = user_table();
    previous_table
        .columns
        .iter_mut()
        .find(|column| column.name == "email")
        .expect("email column exists")
        .nullable = false;
    let mut next_table = previous_table.clone();
    next_table
        .columns
        .iter_mut()
        .find(|column| column.name == "email")
        .expect("email column exists")
        .nullable = true;

    let plan = compare(
        &schema_with(vec![previous_table]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::AlterColumn);
    assert!(plan.changes[0].is_safe);
}

#[test]
fn equivalent_datetime_function_defaults_do_not_alter() {
    let mut previous_table = user_table();
    previous_table.columns.push(
        Column::new("createdAt", "timestamptz")
            .default(DefaultValue::function("now")),
    );
    let mut next_table = user_table();
    next_table.columns.push(
        Column::new("createdAt", "timestamptz")
            .default(DefaultValue::function("CURRENT_TIMESTAMP")),
    );

    let plan = compare(
        &schema_with(vec![previous_table]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert!(plan.changes.is_empty(), "got {:?}", plan.changes);
}

#[test]
fn changed_primary_key_is_flagged_unsafe() {
    let mut next_table = user_table();
    next_table.primary_key = Some(PrimaryKey {
        columns: vec!["email".to_string()],
    });

    let plan = compare(
        &schema_with(vec![user_table()]),
        &schema_with(vec![next_table]),
        postgres(),
    );

    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::AlterColumn);
    assert!(!plan.changes[0].is_safe);
}

#[test]
fn sqlite_collapses_column_alterations_into_one_redefine_table() {
    let sqlite = flavour_for_provider("sqlite").expect("sqlite flavour exists");
    let mut next_table = user_table();
    next_table
        .columns
        .iter_mut()
        .find(|column| column.name == "name")
        .expect("name column exists")
        .nullable = false;

    let plan = compare(
        &schema_with(vec![user_table()]),
        &schema_with(vec![next_table]),
        sqlite,
    );

    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::RedefineTable);
    assert!(!plan.changes[0].is_safe);
}

#[test]
fn migration_ledger_table_never_participates_in_diffs() {
    let ledger = Table {
        name: "_prisma_migrations".to_string(),
        columns: vec![Column::new("migration_name", "text")],
        primary_key: None,
        indexes: Vec::new(),
        foreign_keys: Vec::new(),
    };

    let plan = compare(
        &schema_with(vec![ledger]),
        &DatabaseSchema::default(),
        postgres(),
    );

    assert!(plan.changes.is_empty());
    assert!(plan.tables_to_drop.is_empty());
}

#[test]
fn unsupported_provider_is_rejected_at_flavour_construction() {
    let error = flavour_for_provider("oracle").expect_err("oracle is unsupported");
    assert!(error.to_string().contains("oracle"));
}

#[test]
fn mysql_pairs_tables_case_insensitively() {
    let mysql = flavour_for_provider("mysql").expect("mysql flavour exists");
    let mut previous_table = user_table();
    previous_table.name = "user".to_string();

    let plan = compare(
        &schema_with(vec![previous_table]),
        &schema_with(vec![user_table()]),
        mysql,
    );

    assert!(
        plan.changes
            .iter()
            .all(|change| change.kind != ChangeKind::CreateTable
                && change.kind != ChangeKind::DropTable),
        "case-folded tables must pair, got {:?}",
        plan.changes
    );
}
