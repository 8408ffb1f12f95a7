use rusqlite::{params, Connection};

use crate::db::now_millis;
use crate::error::LibraryResult;

/// Name, description and badge color of the stock categories.
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
  ("Fiction", "Fictional stories and novels", "#6366f1"),
  ("Non-Fiction", "Factual books and biographies", "#8b5cf6"),
  ("Science", "Scientific and technical books", "#3b82f6"),
  ("Technology", "Programming, IT, and technology", "#06b6d4"),
  ("History", "Historical accounts and research", "#f59e0b"),
  ("Philosophy", "Philosophical texts and thoughts", "#ec4899"),
  ("Self-Help", "Personal development and improvement", "#10b981"),
  ("Business", "Business and entrepreneurship", "#f97316"),
  ("Fantasy", "Fantasy and magical stories", "#a855f7"),
  ("Mystery", "Mystery and thriller books", "#ef4444"),
];

/// Insert the stock categories that do not exist yet. Returns how many were added.
pub fn seed_categories(conn: &mut Connection) -> LibraryResult<usize> {
  let tx = conn.transaction()?;
  let now = now_millis();
  let mut added = 0;
  for (name, description, color) in DEFAULT_CATEGORIES {
    added += tx.execute(
      "INSERT OR IGNORE INTO categories (name, description, color, created_at) VALUES (?1, ?2, ?3, ?4)",
      params![name, description, color, now],
    )?;
  }
  tx.commit()?;
  log::info!("seeded {} categories", added);
  Ok(added)
}
