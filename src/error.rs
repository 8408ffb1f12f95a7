use thiserror::Error;

/// Errors surfaced by library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
  #[error("invalid {field}: {message}")]
  Validation { field: &'static str, message: String },

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("not allowed to {action}")]
  Forbidden { action: String },

  #[error("storage error: {message}")]
  Storage { message: String },

  #[error("config error: {message}")]
  Config { message: String },

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl LibraryError {
  pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
    LibraryError::Validation {
      field,
      message: message.into(),
    }
  }

  pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
    LibraryError::NotFound {
      entity,
      id: id.to_string(),
    }
  }
}

pub type LibraryResult<T> = std::result::Result<T, LibraryError>;
