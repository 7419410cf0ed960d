use modelql_core::ROLLBACK_UNAVAILABLE;
use modelql_migrate::{list_migrations, write_migration};

#[test]
fn migrations_list_sorted_by_name_and_round_trip_their_scripts() {
    let root = tempfile::tempdir().expect("temp dir");

    write_migration(
        root.path(),
        "002_posts",
        "CREATE TABLE \"Post\" (\"id\" INTEGER);",
        "DROP TABLE \"Post\";",
    )
    .expect("write succeeds");
    write_migration(
        root.path(),
        "001_users",
        "CREATE TABLE \"User\" (\"id\" INTEGER);",
        "DROP TABLE \"User\";",
    )
    .expect("write succeeds");

    let migrations = list_migrations(root.path()).expect("list succeeds");
    let names = migrations
        .iter()
        .map(|migration| migration.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["001_users", "002_posts"]);

    let forward = migrations[0].forward_script().expect("forward reads");
    assert!(forward.contains("CREATE TABLE \"User\""));
    let rollback = migrations[0].rollback_script().expect("rollback reads");
    assert!(rollback.contains("DROP TABLE \"User\""));
}

#[test]
fn empty_rollback_files_read_as_the_unavailable_sentinel() {
    let root = tempfile::tempdir().expect("temp dir");
    write_migration(root.path(), "001_users", "CREATE TABLE \"User\" (\"id\" INTEGER);", "")
        .expect("write succeeds");

    let migrations = list_migrations(root.path()).expect("list succeeds");
    assert_eq!(
        migrations[0].rollback_script().expect("rollback reads"),
        ROLLBACK_UNAVAILABLE
    );
}

#[test]
fn directory_names_outside_the_allowed_alphabet_are_rejected() {
    let root = tempfile::tempdir().expect("temp dir");
    std::fs::create_dir(root.path().join("bad name")).expect("create dir");

    list_migrations(root.path()).expect_err("invalid entry rejected");
}

#[test]
fn a_missing_migrations_directory_is_an_empty_list() {
    let root = tempfile::tempdir().expect("temp dir");
    let missing = root.path().join("migrations");
    let migrations = list_migrations(&missing).expect("list succeeds");
    assert!(migrations.is_empty());
}
