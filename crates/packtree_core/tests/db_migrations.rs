use packtree_core::db::migrations::latest_version;
use packtree_core::db::{open_db, open_db_in_memory, DbError};
use packtree_core::{CatalogRepoError, SqliteCatalogRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "course_packs");
    assert_table_exists(&conn, "courses");
    assert_table_exists(&conn, "statements");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("packtree.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "course_packs");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn foreign_keys_are_enforced_on_opened_connections() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO courses (id, title, course_pack_id) VALUES ('c', 'C', 'missing');",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn schema_rejects_root_with_parent_and_bad_level() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO course_packs (id, title, level) VALUES ('root', 'W', 1);",
        [],
    )
    .unwrap();

    let root_with_parent = conn.execute(
        "INSERT INTO course_packs (id, title, level, parent_id) VALUES ('r2', 'X', 1, 'root');",
        [],
    );
    assert!(root_with_parent.is_err());

    let level_four = conn.execute(
        "INSERT INTO course_packs (id, title, level, parent_id) VALUES ('deep', 'D', 4, 'root');",
        [],
    );
    assert!(level_four.is_err());
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteCatalogRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        CatalogRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
