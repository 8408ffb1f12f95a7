use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;

use super::books::load_book;
use super::upload::check_length;
use super::Library;
use crate::db::now_millis;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{Note, Tag, User, UserId};
use crate::policy::{authorize, Ability};

const MAX_PAGE_CHARS: usize = 50;
const MAX_TAG_CHARS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct NoteInput {
  pub content: String,
  pub page_number: Option<String>,
  /// `None` keeps a note's tags on update; `Some(vec![])` clears them.
  pub tags: Option<Vec<String>>,
}

impl NoteInput {
  fn validate(&self) -> LibraryResult<(String, Option<String>)> {
    let content = self.content.trim();
    if content.is_empty() {
      return Err(LibraryError::validation("content", "is required"));
    }
    let page_number = match self.page_number.as_deref().map(str::trim) {
      Some(page) if !page.is_empty() => {
        check_length("page_number", page, MAX_PAGE_CHARS)?;
        Some(page.to_string())
      }
      _ => None,
    };
    Ok((content.to_string(), page_number))
  }
}

impl Library {
  /// Attach a note to one of the user's books.
  pub fn create_note(&mut self, user: &User, book_id: i64, input: NoteInput) -> LibraryResult<Note> {
    let book = load_book(&self.conn, book_id)?;
    authorize(user, &book, Ability::View)?;
    let (content, page_number) = input.validate()?;
    let tags = normalize_tags(input.tags.as_deref().unwrap_or_default())?;

    let now = now_millis();
    let tx = self.conn.transaction()?;
    tx.execute(
      "INSERT INTO notes (user_id, book_id, content, page_number, created_at, updated_at) \
      VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      params![user.id, book.id, content, page_number, now],
    )?;
    let note_id = tx.last_insert_rowid();
    sync_tags(&tx, user.id, note_id, &tags)?;
    tx.commit()?;

    log::info!("created note {} on book {} for user {}", note_id, book.id, user.id);
    load_note(&self.conn, note_id)
  }

  pub fn update_note(&mut self, user: &User, note_id: i64, input: NoteInput) -> LibraryResult<Note> {
    let note = load_note(&self.conn, note_id)?;
    authorize(user, &note, Ability::Update)?;
    let (content, page_number) = input.validate()?;
    let tags = input.tags.as_deref().map(normalize_tags).transpose()?;

    let tx = self.conn.transaction()?;
    tx.execute(
      "UPDATE notes SET content = ?1, page_number = ?2, updated_at = ?3 WHERE id = ?4",
      params![content, page_number, now_millis(), note.id],
    )?;
    if let Some(tags) = &tags {
      sync_tags(&tx, user.id, note.id, tags)?;
    }
    tx.commit()?;

    log::info!("updated note {} for user {}", note.id, user.id);
    load_note(&self.conn, note.id)
  }

  pub fn delete_note(&mut self, user: &User, note_id: i64) -> LibraryResult<()> {
    let note = load_note(&self.conn, note_id)?;
    authorize(user, &note, Ability::Delete)?;
    self.conn
      .execute("DELETE FROM notes WHERE id = ?1", params![note.id])?;
    log::info!("deleted note {} for user {}", note.id, user.id);
    Ok(())
  }

  /// Tags the user has created, alphabetically.
  pub fn list_tags(&self, user: &User) -> LibraryResult<Vec<Tag>> {
    let mut stmt = self
      .conn
      .prepare("SELECT id, name FROM tags WHERE user_id = ?1 ORDER BY name")?;
    let rows = stmt.query_map(params![user.id], |row| {
      Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
      })
    })?;
    let mut tags = Vec::new();
    for row in rows {
      tags.push(row?);
    }
    Ok(tags)
  }
}

pub(crate) fn load_note(conn: &Connection, note_id: i64) -> LibraryResult<Note> {
  let note = conn
    .query_row(
      "SELECT id, user_id, book_id, content, page_number, created_at, updated_at \
      FROM notes WHERE id = ?1",
      params![note_id],
      |row| {
        Ok(Note {
          id: row.get(0)?,
          user_id: row.get(1)?,
          book_id: row.get(2)?,
          content: row.get(3)?,
          page_number: row.get(4)?,
          tags: Vec::new(),
          created_at: row.get(5)?,
          updated_at: row.get(6)?,
        })
      },
    )
    .optional()?
    .ok_or_else(|| LibraryError::not_found("note", note_id))?;
  with_tags(conn, note)
}

/// Notes on a book, newest first, with their tags.
pub(crate) fn notes_for_book(conn: &Connection, book_id: i64) -> LibraryResult<Vec<Note>> {
  let mut stmt = conn.prepare(
    "SELECT id, user_id, book_id, content, page_number, created_at, updated_at \
    FROM notes WHERE book_id = ?1 ORDER BY created_at DESC, id DESC",
  )?;
  let rows = stmt.query_map(params![book_id], |row| {
    Ok(Note {
      id: row.get(0)?,
      user_id: row.get(1)?,
      book_id: row.get(2)?,
      content: row.get(3)?,
      page_number: row.get(4)?,
      tags: Vec::new(),
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
    })
  })?;

  let mut notes = Vec::new();
  for row in rows {
    notes.push(with_tags(conn, row?)?);
  }
  Ok(notes)
}

fn with_tags(conn: &Connection, mut note: Note) -> LibraryResult<Note> {
  let mut stmt = conn.prepare(
    "SELECT tags.id, tags.name FROM tags \
    JOIN note_tag ON note_tag.tag_id = tags.id \
    WHERE note_tag.note_id = ?1 ORDER BY tags.name",
  )?;
  let rows = stmt.query_map(params![note.id], |row| {
    Ok(Tag {
      id: row.get(0)?,
      name: row.get(1)?,
    })
  })?;
  for row in rows {
    note.tags.push(row?);
  }
  Ok(note)
}

// Trimmed, blank entries dropped, duplicates collapsed.
fn normalize_tags(tags: &[String]) -> LibraryResult<Vec<String>> {
  let mut seen = BTreeSet::new();
  let mut names = Vec::new();
  for tag in tags {
    let name = tag.trim();
    if name.is_empty() {
      continue;
    }
    check_length("tags", name, MAX_TAG_CHARS)?;
    if seen.insert(name.to_string()) {
      names.push(name.to_string());
    }
  }
  Ok(names)
}

/// Replace the note's tag links, creating the user's tags on first use.
fn sync_tags(tx: &Transaction<'_>, user_id: UserId, note_id: i64, names: &[String]) -> LibraryResult<()> {
  tx.execute("DELETE FROM note_tag WHERE note_id = ?1", params![note_id])?;
  for name in names {
    tx.execute(
      "INSERT OR IGNORE INTO tags (user_id, name) VALUES (?1, ?2)",
      params![user_id, name],
    )?;
    let tag_id: i64 = tx.query_row(
      "SELECT id FROM tags WHERE user_id = ?1 AND name = ?2",
      params![user_id, name],
      |row| row.get(0),
    )?;
    tx.execute(
      "INSERT OR IGNORE INTO note_tag (note_id, tag_id) VALUES (?1, ?2)",
      params![note_id, tag_id],
    )?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::TestLibrary;

  fn tags(names: &[&str]) -> Option<Vec<String>> {
    Some(names.iter().map(|name| name.to_string()).collect())
  }

  #[test]
  fn tags_are_reused_per_user() {
    let mut t = TestLibrary::new();
    let user = t.user("ada@example.com");
    let book = t.upload_epub(&user, "Dune");

    let first = t
      .library
      .create_note(
        &user,
        book.id,
        NoteInput {
          content: "Spice".to_string(),
          page_number: Some("12".to_string()),
          tags: tags(&["scifi", " desert ", "scifi", ""]),
        },
      )
      .expect("first note");
    let second = t
      .library
      .create_note(
        &user,
        book.id,
        NoteInput {
          content: "Worms".to_string(),
          tags: tags(&["desert"]),
          ..NoteInput::default()
        },
      )
      .expect("second note");

    let first_names: Vec<_> = first.tags.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(first_names, vec!["desert", "scifi"]);
    assert_eq!(second.tags[0].id, first.tags[0].id);
    assert_eq!(t.library.list_tags(&user).expect("tags").len(), 2);

    let other = t.user("bob@example.com");
    let book_b = t.upload_epub(&other, "Emma");
    let foreign = t
      .library
      .create_note(
        &other,
        book_b.id,
        NoteInput {
          content: "Hartfield".to_string(),
          tags: tags(&["desert"]),
          ..NoteInput::default()
        },
      )
      .expect("other user's note");
    assert_ne!(foreign.tags[0].id, first.tags[0].id);
  }

  #[test]
  fn update_keeps_tags_unless_supplied() {
    let mut t = TestLibrary::new();
    let user = t.user("ada@example.com");
    let book = t.upload_epub(&user, "Dune");
    let note = t
      .library
      .create_note(
        &user,
        book.id,
        NoteInput {
          content: "Spice".to_string(),
          tags: tags(&["scifi"]),
          ..NoteInput::default()
        },
      )
      .expect("note");

    let kept = t
      .library
      .update_note(
        &user,
        note.id,
        NoteInput {
          content: "Spice must flow".to_string(),
          ..NoteInput::default()
        },
      )
      .expect("update without tags");
    assert_eq!(kept.content, "Spice must flow");
    assert_eq!(kept.tags.len(), 1);

    let cleared = t
      .library
      .update_note(
        &user,
        note.id,
        NoteInput {
          content: "Spice must flow".to_string(),
          tags: Some(Vec::new()),
          ..NoteInput::default()
        },
      )
      .expect("update clearing tags");
    assert!(cleared.tags.is_empty());
  }

  #[test]
  fn rejects_bad_input() {
    let mut t = TestLibrary::new();
    let user = t.user("ada@example.com");
    let book = t.upload_epub(&user, "Dune");

    let err = t
      .library
      .create_note(&user, book.id, NoteInput::default())
      .expect_err("empty content");
    assert!(matches!(err, LibraryError::Validation { field: "content", .. }));

    let err = t
      .library
      .create_note(
        &user,
        book.id,
        NoteInput {
          content: "x".to_string(),
          tags: Some(vec!["t".repeat(51)]),
          ..NoteInput::default()
        },
      )
      .expect_err("long tag");
    assert!(matches!(err, LibraryError::Validation { field: "tags", .. }));
  }

  #[test]
  fn only_the_owner_may_touch_a_note() {
    let mut t = TestLibrary::new();
    let owner = t.user("ada@example.com");
    let stranger = t.user("bob@example.com");
    let book = t.upload_epub(&owner, "Dune");
    let note = t
      .library
      .create_note(
        &owner,
        book.id,
        NoteInput {
          content: "Spice".to_string(),
          ..NoteInput::default()
        },
      )
      .expect("note");

    let err = t
      .library
      .create_note(
        &stranger,
        book.id,
        NoteInput {
          content: "mine now".to_string(),
          ..NoteInput::default()
        },
      )
      .expect_err("stranger's book");
    assert!(matches!(err, LibraryError::Forbidden { .. }));
    assert!(matches!(
      t.library.delete_note(&stranger, note.id),
      Err(LibraryError::Forbidden { .. })
    ));

    t.library.delete_note(&owner, note.id).expect("owner deletes");
    assert!(matches!(
      t.library.delete_note(&owner, note.id),
      Err(LibraryError::NotFound { entity: "note", .. })
    ));
  }
}
