use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;

use crate::error::LibraryResult;

const MIGRATION_INITIAL_SQL: &str = include_str!("../migrations/0000_initial_schema.sql");
const MIGRATION_NOTES_SQL: &str = include_str!("../migrations/0001_notes_and_tags.sql");

/// Open (creating if needed) the library database and bring its schema up to date.
pub fn open_db(path: &Path) -> LibraryResult<Connection> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() && !parent.exists() {
      fs::create_dir_all(parent)?;
    }
  }
  let conn = Connection::open(path)?;
  init_db(conn)
}

pub fn open_in_memory() -> LibraryResult<Connection> {
  init_db(Connection::open_in_memory()?)
}

fn init_db(conn: Connection) -> LibraryResult<Connection> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_migrations (
      id TEXT PRIMARY KEY NOT NULL,
      applied_at INTEGER NOT NULL
    );",
  )?;

  apply_migration(&conn, "0000_initial_schema", MIGRATION_INITIAL_SQL)?;
  apply_migration(&conn, "0001_notes_and_tags", MIGRATION_NOTES_SQL)?;
  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  Ok(conn)
}

fn apply_migration(conn: &Connection, id: &str, sql: &str) -> LibraryResult<()> {
  let existing: Option<String> = conn
    .query_row(
      "SELECT id FROM schema_migrations WHERE id = ?1",
      params![id],
      |row| row.get(0),
    )
    .optional()?;
  if existing.is_some() {
    return Ok(());
  }
  conn.execute_batch(sql)?;
  conn.execute(
    "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
    params![id, chrono::Utc::now().timestamp_millis()],
  )?;
  log::info!("applied migration {}", id);
  Ok(())
}

pub(crate) fn now_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reopening_skips_applied_migrations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("shelf.db");

    drop(open_db(&path).expect("first open"));
    let conn = open_db(&path).expect("second open");

    let applied: i64 = conn
      .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
      .expect("count migrations");
    assert_eq!(applied, 2);
  }

  #[test]
  fn enforces_foreign_keys() {
    let conn = open_in_memory().expect("open");
    let result = conn.execute(
      "INSERT INTO notes (user_id, book_id, content, created_at, updated_at) VALUES (99, 99, 'x', 0, 0)",
      [],
    );
    assert!(result.is_err());
  }
}
