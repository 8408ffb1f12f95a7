use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::OnceLock;

use super::upload::check_length;
use super::Library;
use crate::db::now_millis;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{Author, Category, DashboardStats, ReadingStatus, User};

const MAX_NAME_CHARS: usize = 255;

fn color_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"))
}

impl Library {
  pub fn create_user(&mut self, name: &str, email: &str) -> LibraryResult<User> {
    let name = required_name("name", name)?;
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
      return Err(LibraryError::validation("email", "must be an email address"));
    }
    check_length("email", &email, MAX_NAME_CHARS)?;
    if self.find_user_by_email(&email)?.is_some() {
      return Err(LibraryError::validation("email", "has already been taken"));
    }

    self.conn.execute(
      "INSERT INTO users (name, email, created_at) VALUES (?1, ?2, ?3)",
      params![name, email, now_millis()],
    )?;
    let id = self.conn.last_insert_rowid();
    log::info!("created user {} <{}>", id, email);
    Ok(User { id, name, email })
  }

  pub fn find_user_by_email(&self, email: &str) -> LibraryResult<Option<User>> {
    let user = self
      .conn
      .query_row(
        "SELECT id, name, email FROM users WHERE email = ?1",
        params![email.trim().to_lowercase()],
        |row| {
          Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
          })
        },
      )
      .optional()?;
    Ok(user)
  }

  pub fn list_authors(&self) -> LibraryResult<Vec<Author>> {
    let mut stmt = self
      .conn
      .prepare("SELECT id, name, bio FROM authors ORDER BY name, id")?;
    let rows = stmt.query_map([], |row| {
      Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        bio: row.get(2)?,
      })
    })?;
    let mut authors = Vec::new();
    for row in rows {
      authors.push(row?);
    }
    Ok(authors)
  }

  pub fn create_author(&mut self, name: &str, bio: Option<&str>) -> LibraryResult<Author> {
    let name = required_name("name", name)?;
    let bio = bio
      .map(str::trim)
      .filter(|value| !value.is_empty())
      .map(str::to_string);
    self.conn.execute(
      "INSERT INTO authors (name, bio, created_at) VALUES (?1, ?2, ?3)",
      params![name, bio, now_millis()],
    )?;
    let id = self.conn.last_insert_rowid();
    log::info!("created author {} ({})", id, name);
    Ok(Author { id, name, bio })
  }

  pub fn list_categories(&self) -> LibraryResult<Vec<Category>> {
    let mut stmt = self
      .conn
      .prepare("SELECT id, name, description, color FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], category_from_row)?;
    let mut categories = Vec::new();
    for row in rows {
      categories.push(row?);
    }
    Ok(categories)
  }

  pub fn create_category(
    &mut self,
    name: &str,
    description: Option<&str>,
    color: Option<&str>,
  ) -> LibraryResult<Category> {
    let name = required_name("name", name)?;
    let exists: Option<i64> = self
      .conn
      .query_row(
        "SELECT id FROM categories WHERE name = ?1",
        params![name],
        |row| row.get(0),
      )
      .optional()?;
    if exists.is_some() {
      return Err(LibraryError::validation("name", "has already been taken"));
    }

    let description = description
      .map(str::trim)
      .filter(|value| !value.is_empty())
      .map(str::to_string);
    let color = match color.map(str::trim).filter(|value| !value.is_empty()) {
      Some(value) if color_pattern().is_match(value) => Some(value.to_lowercase()),
      Some(_) => {
        return Err(LibraryError::validation("color", "must look like #rrggbb"));
      }
      None => None,
    };

    self.conn.execute(
      "INSERT INTO categories (name, description, color, created_at) VALUES (?1, ?2, ?3, ?4)",
      params![name, description, color, now_millis()],
    )?;
    let id = self.conn.last_insert_rowid();
    log::info!("created category {} ({})", id, name);
    Ok(Category {
      id,
      name,
      description,
      color,
    })
  }

  /// Counts for the user's front page.
  pub fn dashboard(&self, user: &User) -> LibraryResult<DashboardStats> {
    let count = |sql: &str, params: &[&dyn rusqlite::ToSql]| -> LibraryResult<u64> {
      let value: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
      Ok(value.max(0) as u64)
    };
    Ok(DashboardStats {
      total_books: count(
        "SELECT COUNT(*) FROM books WHERE user_id = ?1",
        params![user.id],
      )?,
      read_books: count(
        "SELECT COUNT(*) FROM books WHERE user_id = ?1 AND status = ?2",
        params![user.id, ReadingStatus::Completed],
      )?,
      total_notes: count(
        "SELECT COUNT(*) FROM notes JOIN books ON books.id = notes.book_id \
        WHERE books.user_id = ?1",
        params![user.id],
      )?,
    })
  }
}

pub(crate) fn find_author(conn: &Connection, author_id: i64) -> LibraryResult<Option<Author>> {
  let author = conn
    .query_row(
      "SELECT id, name, bio FROM authors WHERE id = ?1",
      params![author_id],
      |row| {
        Ok(Author {
          id: row.get(0)?,
          name: row.get(1)?,
          bio: row.get(2)?,
        })
      },
    )
    .optional()?;
  Ok(author)
}

pub(crate) fn find_category(conn: &Connection, category_id: i64) -> LibraryResult<Option<Category>> {
  let category = conn
    .query_row(
      "SELECT id, name, description, color FROM categories WHERE id = ?1",
      params![category_id],
      category_from_row,
    )
    .optional()?;
  Ok(category)
}

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
  Ok(Category {
    id: row.get(0)?,
    name: row.get(1)?,
    description: row.get(2)?,
    color: row.get(3)?,
  })
}

fn required_name(field: &'static str, value: &str) -> LibraryResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(LibraryError::validation(field, "is required"));
  }
  check_length(field, value, MAX_NAME_CHARS)?;
  Ok(value.to_string())
}
