use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::PathBuf;

use super::upload::{
  hash_file, optional_text, validate_cover_image, validate_document, validate_progress,
  validate_rating, validate_title, BookFields, UploadRequest, UploadedFile, MAX_ISBN_CHARS,
  MAX_PUBLISHER_CHARS,
};
use super::{discard_blob, notes, storage_error, Library};
use crate::db::now_millis;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{
  format_file_size, Book, BookDetail, BookSummary, FileKind, Page, ReadingStatus, User,
};
use crate::policy::{authorize, Ability};

const BOOK_COLUMNS: &str = "id, user_id, author_id, category_id, title, isbn, publisher, publish_date, \
  description, cover_image, file_path, file_type, file_size, file_hash, pages, reading_progress, \
  status, rating, created_at, updated_at";

/// List filters; all optional and combined with AND.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
  pub category_id: Option<i64>,
  pub status: Option<ReadingStatus>,
  /// Substring of the title or the author's name.
  pub search: Option<String>,
  /// 1-based page number.
  pub page: Option<u32>,
}

/// Partial update. `None` leaves a field alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct BookUpdate {
  pub title: Option<String>,
  pub author_id: Option<Option<i64>>,
  pub category_id: Option<Option<i64>>,
  pub isbn: Option<Option<String>>,
  pub publisher: Option<Option<String>>,
  pub publish_date: Option<Option<NaiveDate>>,
  pub description: Option<Option<String>>,
  pub rating: Option<Option<u8>>,
  pub pages: Option<Option<u32>>,
  pub status: Option<ReadingStatus>,
  pub reading_progress: Option<f64>,
  pub cover_image: Option<UploadedFile>,
}

impl Library {
  /// Store a new document and create its book row.
  ///
  /// When no cover is supplied a placeholder is generated from the
  /// document's own metadata. Cover generation never fails the upload.
  pub fn upload_book(&mut self, user: &User, request: UploadRequest) -> LibraryResult<Book> {
    let fields = request.fields.normalized()?;
    ensure_author(&self.conn, fields.author_id)?;
    ensure_category(&self.conn, fields.category_id)?;
    let (kind, size) = validate_document(&request.file)?;
    let cover_extension = request
      .cover_image
      .as_ref()
      .map(validate_cover_image)
      .transpose()?;
    let file_hash = hash_file(&request.file.path)?;

    let file_key = self
      .documents
      .store_file(&request.file.path, kind.as_str())
      .map_err(storage_error)?;

    let mut cover_key = None;
    if let (Some(cover), Some(extension)) = (&request.cover_image, cover_extension) {
      match self.covers.store_file(&cover.path, extension) {
        Ok(key) => cover_key = Some(key),
        Err(err) => {
          discard_blob(&self.documents, &file_key);
          return Err(storage_error(err));
        }
      }
    }

    let inserted = insert_book(
      &mut self.conn,
      user,
      &fields,
      NewFile {
        key: &file_key,
        kind,
        size,
        hash: &file_hash,
      },
      cover_key.as_deref(),
    );

    let book_id = match inserted {
      Ok(id) => id,
      Err(err) => {
        log::error!("failed to record upload {}: {}", request.file.original_name, err);
        discard_blob(&self.documents, &file_key);
        if let Some(key) = &cover_key {
          discard_blob(&self.covers, key);
        }
        return Err(err);
      }
    };

    if cover_key.is_none() {
      let document_path = self.documents.path(&file_key).map_err(storage_error)?;
      if let Some(key) = self.synthesizer.cover_for_upload(&document_path, &fields.title) {
        let updated = self.conn.execute(
          "UPDATE books SET cover_image = ?1 WHERE id = ?2",
          params![key, book_id],
        );
        if let Err(err) = updated {
          log::warn!("failed to attach generated cover to book {}: {}", book_id, err);
          discard_blob(&self.covers, &key);
        }
      }
    }

    log::info!(
      "uploaded book {} ({}, {} bytes) for user {}",
      book_id,
      kind,
      size,
      user.id
    );
    load_book(&self.conn, book_id)
  }

  pub fn list_books(&self, user: &User, filter: &BookFilter) -> LibraryResult<Page<BookSummary>> {
    let mut clauses = vec!["books.user_id = ?".to_string()];
    let mut values = vec![Value::Integer(user.id)];

    if let Some(category_id) = filter.category_id {
      clauses.push("books.category_id = ?".to_string());
      values.push(Value::Integer(category_id));
    }
    if let Some(status) = filter.status {
      clauses.push("books.status = ?".to_string());
      values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
      clauses.push(
        "(books.title LIKE ? ESCAPE '\\' OR authors.name LIKE ? ESCAPE '\\')".to_string(),
      );
      let pattern = format!("%{}%", escape_like(search));
      values.push(Value::Text(pattern.clone()));
      values.push(Value::Text(pattern));
    }

    let from = format!(
      "FROM books \
      LEFT JOIN authors ON authors.id = books.author_id \
      LEFT JOIN categories ON categories.id = books.category_id \
      WHERE {}",
      clauses.join(" AND ")
    );

    let total: i64 = self.conn.query_row(
      &format!("SELECT COUNT(*) {}", from),
      params_from_iter(values.iter()),
      |row| row.get(0),
    )?;
    let total = total.max(0) as u64;

    let per_page = self.per_page;
    let page = filter.page.unwrap_or(1).max(1);
    let last_page = (total.div_ceil(per_page as u64)).max(1) as u32;
    let offset = (page as i64 - 1) * per_page as i64;

    let mut stmt = self.conn.prepare(&format!(
      "SELECT books.id, books.title, authors.name, categories.name, books.cover_image, \
      books.file_type, books.status, books.reading_progress, books.rating, books.created_at \
      {} ORDER BY books.created_at DESC, books.id DESC LIMIT {} OFFSET {}",
      from, per_page, offset
    ))?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
      Ok(BookSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        category: row.get(3)?,
        cover_image: row.get(4)?,
        file_type: row.get(5)?,
        status: row.get(6)?,
        reading_progress: row.get(7)?,
        rating: row.get(8)?,
        created_at: row.get(9)?,
      })
    })?;

    let mut items = Vec::new();
    for row in rows {
      items.push(row?);
    }

    Ok(Page {
      items,
      total,
      page,
      per_page,
      last_page,
    })
  }

  pub fn show_book(&self, user: &User, book_id: i64) -> LibraryResult<BookDetail> {
    let book = load_book(&self.conn, book_id)?;
    authorize(user, &book, Ability::View)?;

    let author = match book.author_id {
      Some(id) => super::catalog::find_author(&self.conn, id)?,
      None => None,
    };
    let category = match book.category_id {
      Some(id) => super::catalog::find_category(&self.conn, id)?,
      None => None,
    };
    let notes = notes::notes_for_book(&self.conn, book.id)?;
    let formatted_file_size = format_file_size(book.file_size);

    Ok(BookDetail {
      book,
      author,
      category,
      notes,
      formatted_file_size,
    })
  }

  pub fn update_book(&mut self, user: &User, book_id: i64, update: BookUpdate) -> LibraryResult<Book> {
    let mut book = load_book(&self.conn, book_id)?;
    authorize(user, &book, Ability::Update)?;

    if let Some(title) = &update.title {
      book.title = validate_title(title)?;
    }
    if let Some(author_id) = update.author_id {
      ensure_author(&self.conn, author_id)?;
      book.author_id = author_id;
    }
    if let Some(category_id) = update.category_id {
      ensure_category(&self.conn, category_id)?;
      book.category_id = category_id;
    }
    if let Some(isbn) = update.isbn {
      book.isbn = optional_text("isbn", isbn, MAX_ISBN_CHARS)?;
    }
    if let Some(publisher) = update.publisher {
      book.publisher = optional_text("publisher", publisher, MAX_PUBLISHER_CHARS)?;
    }
    if let Some(publish_date) = update.publish_date {
      book.publish_date = publish_date;
    }
    if let Some(description) = update.description {
      book.description = description
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    }
    if let Some(rating) = update.rating {
      book.rating = rating.map(validate_rating).transpose()?;
    }
    if let Some(pages) = update.pages {
      book.pages = pages;
    }
    if let Some(status) = update.status {
      book.status = status;
    }
    if let Some(progress) = update.reading_progress {
      book.reading_progress = validate_progress(progress)?;
    }

    let stored_cover = match &update.cover_image {
      Some(cover) => Some(self.swap_cover(&book, cover)?),
      None => None,
    };
    if let Some(key) = &stored_cover {
      book.cover_image = Some(key.clone());
    }

    book.updated_at = now_millis();
    let updated = self.conn.execute(
      "UPDATE books SET author_id = ?1, category_id = ?2, title = ?3, isbn = ?4, publisher = ?5, \
      publish_date = ?6, description = ?7, cover_image = ?8, reading_progress = ?9, status = ?10, \
      rating = ?11, pages = ?12, updated_at = ?13 WHERE id = ?14",
      params![
        book.author_id,
        book.category_id,
        book.title,
        book.isbn,
        book.publisher,
        book.publish_date,
        book.description,
        book.cover_image,
        book.reading_progress,
        book.status,
        book.rating,
        book.pages,
        book.updated_at,
        book.id,
      ],
    );
    if let Err(err) = updated {
      if let Some(key) = &stored_cover {
        discard_blob(&self.covers, key);
      }
      return Err(err.into());
    }
    log::info!("updated book {} for user {}", book.id, user.id);
    load_book(&self.conn, book.id)
  }

  /// Replace a book's cover with an uploaded image.
  pub fn replace_cover(&mut self, user: &User, book_id: i64, image: UploadedFile) -> LibraryResult<Book> {
    self.update_book(
      user,
      book_id,
      BookUpdate {
        cover_image: Some(image),
        ..BookUpdate::default()
      },
    )
  }

  /// Remove the book row together with its document and cover files.
  ///
  /// The row goes first; files that cannot be removed afterwards are logged
  /// and left behind.
  pub fn delete_book(&mut self, user: &User, book_id: i64) -> LibraryResult<()> {
    let book = load_book(&self.conn, book_id)?;
    authorize(user, &book, Ability::Delete)?;

    self.conn
      .execute("DELETE FROM books WHERE id = ?1", params![book.id])?;
    discard_blob(&self.documents, &book.file_path);
    if let Some(cover) = &book.cover_image {
      discard_blob(&self.covers, cover);
    }
    log::info!("deleted book {} for user {}", book.id, user.id);
    Ok(())
  }

  /// On-disk location of the book's document, for reading.
  pub fn book_file(&self, user: &User, book_id: i64) -> LibraryResult<PathBuf> {
    let book = load_book(&self.conn, book_id)?;
    authorize(user, &book, Ability::View)?;

    if !self.documents.exists(&book.file_path) {
      log::warn!("document {} for book {} is missing", book.file_path, book.id);
      return Err(LibraryError::not_found("document", &book.file_path));
    }
    self.documents.path(&book.file_path).map_err(storage_error)
  }

  // The old cover goes first so a failed store leaves the row without a
  // cover rather than pointing at a deleted file.
  fn swap_cover(&mut self, book: &Book, cover: &UploadedFile) -> LibraryResult<String> {
    let extension = validate_cover_image(cover)?;
    if let Some(old) = &book.cover_image {
      self.covers.delete(old).map_err(storage_error)?;
      self.conn.execute(
        "UPDATE books SET cover_image = NULL WHERE id = ?1",
        params![book.id],
      )?;
    }
    let key = self
      .covers
      .store_file(&cover.path, extension)
      .map_err(storage_error)?;
    log::info!("stored cover {} for book {}", key, book.id);
    Ok(key)
  }
}

struct NewFile<'a> {
  key: &'a str,
  kind: FileKind,
  size: u64,
  hash: &'a str,
}

fn insert_book(
  conn: &mut Connection,
  user: &User,
  fields: &BookFields,
  file: NewFile<'_>,
  cover_key: Option<&str>,
) -> LibraryResult<i64> {
  let now = now_millis();
  let tx = conn.transaction()?;
  tx.execute(
    "INSERT INTO books (user_id, author_id, category_id, title, isbn, publisher, publish_date, \
    description, cover_image, file_path, file_type, file_size, file_hash, rating, created_at, updated_at) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
    params![
      user.id,
      fields.author_id,
      fields.category_id,
      fields.title,
      fields.isbn,
      fields.publisher,
      fields.publish_date,
      fields.description,
      cover_key,
      file.key,
      file.kind,
      file.size as i64,
      file.hash,
      fields.rating,
      now,
    ],
  )?;
  let id = tx.last_insert_rowid();
  tx.commit()?;
  Ok(id)
}

pub(crate) fn load_book(conn: &Connection, book_id: i64) -> LibraryResult<Book> {
  conn.query_row(
    &format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS),
    params![book_id],
    book_from_row,
  )
  .optional()?
  .ok_or_else(|| LibraryError::not_found("book", book_id))
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
  let file_size: i64 = row.get(12)?;
  Ok(Book {
    id: row.get(0)?,
    user_id: row.get(1)?,
    author_id: row.get(2)?,
    category_id: row.get(3)?,
    title: row.get(4)?,
    isbn: row.get(5)?,
    publisher: row.get(6)?,
    publish_date: row.get(7)?,
    description: row.get(8)?,
    cover_image: row.get(9)?,
    file_path: row.get(10)?,
    file_type: row.get::<_, FileKind>(11)?,
    file_size: file_size.max(0) as u64,
    file_hash: row.get(13)?,
    pages: row.get(14)?,
    reading_progress: row.get(15)?,
    status: row.get(16)?,
    rating: row.get(17)?,
    created_at: row.get(18)?,
    updated_at: row.get(19)?,
  })
}

fn ensure_author(conn: &Connection, author_id: Option<i64>) -> LibraryResult<()> {
  let Some(id) = author_id else {
    return Ok(());
  };
  if super::catalog::find_author(conn, id)?.is_none() {
    return Err(LibraryError::validation("author_id", format!("author {} does not exist", id)));
  }
  Ok(())
}

fn ensure_category(conn: &Connection, category_id: Option<i64>) -> LibraryResult<()> {
  let Some(id) = category_id else {
    return Ok(());
  };
  if super::catalog::find_category(conn, id)?.is_none() {
    return Err(LibraryError::validation(
      "category_id",
      format!("category {} does not exist", id),
    ));
  }
  Ok(())
}

fn escape_like(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for c in value.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}
