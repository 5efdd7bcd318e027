use rubric_core::db::migrations::{current_user_version, latest_version};
use rubric_core::db::{open_db, open_db_in_memory, DbError};
use rubric_core::{AggregationMode, CohortRepository, RepoError, SqliteCohortRepository};
use rusqlite::Connection;

#[test]
fn in_memory_database_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    for table in [
        "learning_objectives",
        "cohort_groups",
        "domains",
        "students",
        "student_groups",
        "student_properties",
        "progress_records",
    ] {
        assert_table_exists(&conn, table);
    }
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_a_file_database_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rubric.sqlite3");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO cohort_groups (group_uuid, name) VALUES ('g-1', 'Red');",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM cohort_groups;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn version_one_database_upgrades_with_default_domain_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch(
        "PRAGMA user_version = 1;
         INSERT INTO domains (domain_uuid, name)
         VALUES ('6f1c1d1e-8a55-4c55-9d2e-2b6f0f4f8a01', 'Data');",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    let repo = SqliteCohortRepository::try_new(&conn).unwrap();
    let domain = repo.find_domain_by_name("Data").unwrap().unwrap();
    assert_eq!(domain.aggregation_mode, AggregationMode::ComputedCohortAverage);
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteCohortRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection was accepted"),
    }
}

#[test]
fn percentages_outside_range_are_rejected_by_the_schema() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO progress_records (subject_kind, subject_uuid, objective_code, percentage)
         VALUES ('student', 's-1', 'A.1', 101);",
        [],
    );
    assert!(result.is_err());
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
