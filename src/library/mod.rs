//! The library service: books, notes and the shared author/category catalog,
//! all scoped to the acting user.

pub mod books;
pub mod catalog;
pub mod notes;
pub mod upload;

use rusqlite::Connection;

use crate::config::LibraryConfig;
use crate::cover::font::FontLocator;
use crate::cover::CoverSynthesizer;
use crate::db;
use crate::error::{LibraryError, LibraryResult};
use crate::storage::BlobStore;

pub use books::{BookFilter, BookUpdate};
pub use notes::NoteInput;
pub use upload::{BookFields, UploadRequest, UploadedFile};

pub struct Library {
  conn: Connection,
  documents: BlobStore,
  covers: BlobStore,
  synthesizer: CoverSynthesizer,
  per_page: u32,
}

impl Library {
  pub fn open(config: &LibraryConfig) -> LibraryResult<Self> {
    std::fs::create_dir_all(&config.data_dir)?;
    let conn = db::open_db(&config.database_path())?;
    let covers = BlobStore::new(config.covers_dir());
    let synthesizer = CoverSynthesizer::new(
      config.cover.clone(),
      FontLocator::new(config.font_candidates.clone()),
      covers.clone(),
      config.scratch_dir(),
    );
    log::info!("library opened at {}", config.data_dir.display());
    Ok(Library::from_parts(
      conn,
      BlobStore::new(config.documents_dir()),
      covers,
      synthesizer,
      config.per_page,
    ))
  }

  pub fn from_parts(
    conn: Connection,
    documents: BlobStore,
    covers: BlobStore,
    synthesizer: CoverSynthesizer,
    per_page: u32,
  ) -> Self {
    Library {
      conn,
      documents,
      covers,
      synthesizer,
      per_page: per_page.max(1),
    }
  }

  pub fn connection(&self) -> &Connection {
    &self.conn
  }

  pub fn connection_mut(&mut self) -> &mut Connection {
    &mut self.conn
  }

  pub fn documents(&self) -> &BlobStore {
    &self.documents
  }

  pub fn covers(&self) -> &BlobStore {
    &self.covers
  }
}

pub(crate) fn storage_error(err: std::io::Error) -> LibraryError {
  LibraryError::Storage {
    message: err.to_string(),
  }
}

/// Best-effort blob removal used when rolling back or cleaning up.
pub(crate) fn discard_blob(store: &BlobStore, key: &str) {
  if let Err(err) = store.delete(key) {
    log::warn!("failed to delete blob {} from {}: {}", key, store.root().display(), err);
  }
}
