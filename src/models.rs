use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub type UserId = i64;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
  pub id: UserId,
  pub name: String,
  pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
  pub id: i64,
  pub user_id: UserId,
  pub author_id: Option<i64>,
  pub category_id: Option<i64>,
  pub title: String,
  pub isbn: Option<String>,
  pub publisher: Option<String>,
  pub publish_date: Option<NaiveDate>,
  pub description: Option<String>,
  pub cover_image: Option<String>, // key in the covers bucket
  pub file_path: String,           // key in the documents bucket
  pub file_type: FileKind,
  pub file_size: u64,
  pub file_hash: Option<String>,
  pub pages: Option<u32>,
  pub reading_progress: f64,
  pub status: ReadingStatus,
  pub rating: Option<u8>,
  pub created_at: i64,
  pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Author {
  pub id: i64,
  pub name: String,
  pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
  pub id: i64,
  pub name: String,
  pub description: Option<String>,
  pub color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
  pub id: i64,
  pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Note {
  pub id: i64,
  pub user_id: UserId,
  pub book_id: i64,
  pub content: String,
  pub page_number: Option<String>,
  pub tags: Vec<Tag>,
  pub created_at: i64,
  pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
  #[default]
  Unread,
  Reading,
  Completed,
}

impl ReadingStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ReadingStatus::Unread => "unread",
      ReadingStatus::Reading => "reading",
      ReadingStatus::Completed => "completed",
    }
  }
}

impl FromStr for ReadingStatus {
  type Err = String;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "unread" => Ok(ReadingStatus::Unread),
      "reading" => Ok(ReadingStatus::Reading),
      "completed" => Ok(ReadingStatus::Completed),
      other => Err(format!("unknown reading status: {}", other)),
    }
  }
}

impl fmt::Display for ReadingStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl ToSql for ReadingStatus {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(ToSqlOutput::from(self.as_str()))
  }
}

impl FromSql for ReadingStatus {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    value
      .as_str()?
      .parse()
      .map_err(|err: String| FromSqlError::Other(err.into()))
  }
}

/// Document formats accepted for upload.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
  Pdf,
  Epub,
  Mobi,
}

impl FileKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      FileKind::Pdf => "pdf",
      FileKind::Epub => "epub",
      FileKind::Mobi => "mobi",
    }
  }

  pub fn from_extension(extension: &str) -> Option<Self> {
    match extension.to_lowercase().as_str() {
      "pdf" => Some(FileKind::Pdf),
      "epub" => Some(FileKind::Epub),
      "mobi" => Some(FileKind::Mobi),
      _ => None,
    }
  }

  pub fn from_path(path: &Path) -> Option<Self> {
    path.extension()
      .and_then(|value| value.to_str())
      .and_then(FileKind::from_extension)
  }
}

impl FromStr for FileKind {
  type Err = String;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    FileKind::from_extension(value).ok_or_else(|| format!("unknown file type: {}", value))
  }
}

impl fmt::Display for FileKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl ToSql for FileKind {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(ToSqlOutput::from(self.as_str()))
  }
}

impl FromSql for FileKind {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    value
      .as_str()?
      .parse()
      .map_err(|err: String| FromSqlError::Other(err.into()))
  }
}

/// Row shape of the paginated book list.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
  pub id: i64,
  pub title: String,
  pub author: Option<String>,
  pub category: Option<String>,
  pub cover_image: Option<String>,
  pub file_type: FileKind,
  pub status: ReadingStatus,
  pub reading_progress: f64,
  pub rating: Option<u8>,
  pub created_at: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct BookDetail {
  pub book: Book,
  pub author: Option<Author>,
  pub category: Option<Category>,
  pub notes: Vec<Note>,
  pub formatted_file_size: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  pub page: u32,
  pub per_page: u32,
  pub last_page: u32,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
  pub total_books: u64,
  pub read_books: u64,
  pub total_notes: u64,
}

/// Human readable size, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  let mut value = bytes as f64;
  let mut unit = 0;
  while value > 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  let rounded = (value * 100.0).round() / 100.0;
  format!("{} {}", rounded, UNITS[unit])
}
