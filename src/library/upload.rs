//! Validation of incoming files and user-entered book fields.
//!
//! Files arrive as paths to temporary copies owned by the caller; nothing
//! here moves or deletes them.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{LibraryError, LibraryResult};
use crate::models::FileKind;

pub const MAX_DOCUMENT_BYTES: u64 = 100 * 1024 * 1024;
pub const MAX_COVER_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_ISBN_CHARS: usize = 20;
pub const MAX_PUBLISHER_CHARS: usize = 255;

#[derive(Debug, Clone)]
pub struct UploadedFile {
  pub path: PathBuf,
  /// Client-side file name; its extension decides the document kind.
  pub original_name: String,
}

impl UploadedFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let original_name = path
      .file_name()
      .map(|value| value.to_string_lossy().to_string())
      .unwrap_or_default();
    UploadedFile {
      path,
      original_name,
    }
  }

  pub fn with_name(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
    UploadedFile {
      path: path.into(),
      original_name: original_name.into(),
    }
  }

  fn size(&self) -> LibraryResult<u64> {
    let metadata = std::fs::metadata(&self.path).map_err(|err| {
      LibraryError::validation("file", format!("{}: {}", self.path.display(), err))
    })?;
    if !metadata.is_file() {
      return Err(LibraryError::validation(
        "file",
        format!("{} is not a file", self.path.display()),
      ));
    }
    Ok(metadata.len())
  }
}

/// Book metadata entered by the user at upload time.
#[derive(Debug, Clone, Default)]
pub struct BookFields {
  pub title: String,
  pub author_id: Option<i64>,
  pub category_id: Option<i64>,
  pub isbn: Option<String>,
  pub publisher: Option<String>,
  pub publish_date: Option<NaiveDate>,
  pub description: Option<String>,
  pub rating: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub fields: BookFields,
  pub file: UploadedFile,
  pub cover_image: Option<UploadedFile>,
}

impl BookFields {
  /// Trim free text, turn blank optionals into `None` and check limits.
  pub(crate) fn normalized(self) -> LibraryResult<Self> {
    Ok(BookFields {
      title: validate_title(&self.title)?,
      author_id: self.author_id,
      category_id: self.category_id,
      isbn: optional_text("isbn", self.isbn, MAX_ISBN_CHARS)?,
      publisher: optional_text("publisher", self.publisher, MAX_PUBLISHER_CHARS)?,
      publish_date: self.publish_date,
      description: self
        .description
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()),
      rating: self.rating.map(validate_rating).transpose()?,
    })
  }
}

pub(crate) fn validate_title(title: &str) -> LibraryResult<String> {
  let title = title.trim();
  if title.is_empty() {
    return Err(LibraryError::validation("title", "is required"));
  }
  check_length("title", title, MAX_TITLE_CHARS)?;
  Ok(title.to_string())
}

pub(crate) fn optional_text(
  field: &'static str,
  value: Option<String>,
  max_chars: usize,
) -> LibraryResult<Option<String>> {
  let Some(value) = value else {
    return Ok(None);
  };
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Ok(None);
  }
  check_length(field, trimmed, max_chars)?;
  Ok(Some(trimmed.to_string()))
}

pub(crate) fn check_length(field: &'static str, value: &str, max_chars: usize) -> LibraryResult<()> {
  if value.chars().count() > max_chars {
    return Err(LibraryError::validation(
      field,
      format!("must be at most {} characters", max_chars),
    ));
  }
  Ok(())
}

pub(crate) fn validate_rating(rating: u8) -> LibraryResult<u8> {
  if (1..=5).contains(&rating) {
    Ok(rating)
  } else {
    Err(LibraryError::validation("rating", "must be between 1 and 5"))
  }
}

/// Progress percentage rounded to two decimals.
pub(crate) fn validate_progress(progress: f64) -> LibraryResult<f64> {
  if !progress.is_finite() || !(0.0..=100.0).contains(&progress) {
    return Err(LibraryError::validation(
      "reading_progress",
      "must be between 0 and 100",
    ));
  }
  Ok((progress * 100.0).round() / 100.0)
}

/// Accept pdf/epub/mobi up to 100 MiB.
pub(crate) fn validate_document(file: &UploadedFile) -> LibraryResult<(FileKind, u64)> {
  let kind = FileKind::from_path(Path::new(&file.original_name)).ok_or_else(|| {
    LibraryError::validation("file", "must be a pdf, epub or mobi file")
  })?;
  let size = file.size()?;
  if size > MAX_DOCUMENT_BYTES {
    return Err(LibraryError::validation("file", "must not be larger than 100 MB"));
  }
  Ok((kind, size))
}

/// Accept files whose content sniffs as an image, up to 5 MiB.
/// Returns the extension to store it under.
pub(crate) fn validate_cover_image(file: &UploadedFile) -> LibraryResult<&'static str> {
  let size = file.size()?;
  if size > MAX_COVER_BYTES {
    return Err(LibraryError::validation(
      "cover_image",
      "must not be larger than 5 MB",
    ));
  }
  let mut header = [0u8; 64];
  let read = std::fs::File::open(&file.path)
    .and_then(|mut handle| handle.read(&mut header))
    .map_err(|err| LibraryError::validation("cover_image", err.to_string()))?;
  let format = image::guess_format(&header[..read])
    .map_err(|_| LibraryError::validation("cover_image", "must be an image"))?;
  format
    .extensions_str()
    .first()
    .copied()
    .ok_or_else(|| LibraryError::validation("cover_image", "must be an image"))
}

pub(crate) fn hash_file(path: &Path) -> Result<String, std::io::Error> {
  let mut file = std::fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 64 * 1024];
  loop {
    let read = file.read(&mut buffer)?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
  }
  let result = hasher.finalize();
  Ok(result.iter().map(|byte| format!("{:02x}", byte)).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalizes_fields() {
    let fields = BookFields {
      title: "  Dune  ".to_string(),
      isbn: Some("   ".to_string()),
      publisher: Some(" Chilton ".to_string()),
      description: Some("\n".to_string()),
      rating: Some(5),
      ..BookFields::default()
    }
    .normalized()
    .expect("valid fields");

    assert_eq!(fields.title, "Dune");
    assert_eq!(fields.isbn, None);
    assert_eq!(fields.publisher.as_deref(), Some("Chilton"));
    assert_eq!(fields.description, None);
    assert_eq!(fields.rating, Some(5));
  }

  #[test]
  fn rejects_out_of_range_values() {
    assert!(validate_title("   ").is_err());
    assert!(validate_title(&"x".repeat(256)).is_err());
    assert!(validate_rating(0).is_err());
    assert!(validate_rating(6).is_err());
    assert!(optional_text("isbn", Some("1".repeat(21)), MAX_ISBN_CHARS).is_err());
    assert!(validate_progress(100.5).is_err());
    assert!(validate_progress(f64::NAN).is_err());
  }

  #[test]
  fn rounds_progress_to_two_decimals() {
    assert_eq!(validate_progress(33.3333).expect("valid"), 33.33);
    assert_eq!(validate_progress(100.0).expect("valid"), 100.0);
  }

  #[test]
  fn document_kind_comes_from_the_client_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let temp = dir.path().join("php1234.tmp");
    std::fs::write(&temp, b"%PDF-1.5").expect("write");

    let (kind, size) =
      validate_document(&UploadedFile::with_name(&temp, "Dune.pdf")).expect("pdf");
    assert_eq!(kind, FileKind::Pdf);
    assert_eq!(size, 8);

    let err = validate_document(&UploadedFile::with_name(&temp, "Dune.docx"))
      .expect_err("docx is rejected");
    assert!(matches!(err, LibraryError::Validation { field: "file", .. }));
  }

  #[test]
  fn cover_must_be_an_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fake = dir.path().join("cover.jpg");
    std::fs::write(&fake, b"plain text pretending").expect("write");
    assert!(validate_cover_image(&UploadedFile::new(&fake)).is_err());

    let real = dir.path().join("cover.png");
    image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]))
      .save(&real)
      .expect("save png");
    assert_eq!(validate_cover_image(&UploadedFile::new(&real)).expect("png"), "png");
  }

  #[test]
  fn hashes_file_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"abc").expect("write");
    assert_eq!(
      hash_file(&path).expect("hash"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }
}
