//! Placeholder covers generated from a document's embedded metadata.
//!
//! Only PDFs carry metadata we read here; EPUB and MOBI uploads are "not
//! applicable" rather than an error. Generation is best effort: callers on
//! the upload path go through [`CoverSynthesizer::cover_for_upload`], which
//! logs any failure and carries on without a cover.

pub mod font;
pub mod layout;
pub mod metadata;
pub mod render;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::CoverSettings;
use crate::models::FileKind;
use crate::storage::BlobStore;
use font::FontLocator;
use layout::CoverLayout;
use metadata::{MetadataExtractor, MetadataSupport, PdfMetadataExtractor};

#[derive(Debug, Clone, Error)]
pub enum CoverError {
  #[error("metadata extraction failed for {}: {message}", path.display())]
  MetadataExtractionFailed { path: PathBuf, message: String },

  #[error("no usable font found ({tried} candidate paths tried)")]
  FontUnavailable { tried: usize },

  #[error("cover encode/persist failed: {message}")]
  EncodeOrPersistFailed { message: String },
}

pub type CoverResult<T> = std::result::Result<T, CoverError>;

pub struct CoverSynthesizer {
  settings: CoverSettings,
  fonts: FontLocator,
  covers: BlobStore,
  scratch_dir: PathBuf,
  pdf: Box<dyn MetadataExtractor>,
  rng: StdRng,
}

impl CoverSynthesizer {
  pub fn new(
    settings: CoverSettings,
    fonts: FontLocator,
    covers: BlobStore,
    scratch_dir: impl Into<PathBuf>,
  ) -> Self {
    let rng = match settings.palette_seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    CoverSynthesizer {
      settings,
      fonts,
      covers,
      scratch_dir: scratch_dir.into(),
      pdf: Box::new(PdfMetadataExtractor),
      rng,
    }
  }

  /// Swap the PDF metadata reader, e.g. for a stub.
  pub fn with_pdf_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
    self.pdf = extractor;
    self
  }

  pub fn with_rng(mut self, rng: StdRng) -> Self {
    self.rng = rng;
    self
  }

  pub fn extractor_for(&self, kind: FileKind) -> MetadataSupport<'_> {
    match kind {
      FileKind::Pdf => MetadataSupport::Supported(self.pdf.as_ref()),
      FileKind::Epub | FileKind::Mobi => MetadataSupport::Unsupported,
    }
  }

  /// Generate and store a cover for `document_path`.
  ///
  /// Returns `Ok(None)` when the format has no metadata to draw from and
  /// `Ok(Some(key))` with the covers-bucket key on success.
  pub fn synthesize_cover(
    &mut self,
    document_path: &Path,
    fallback_title: &str,
  ) -> CoverResult<Option<String>> {
    let extractor = match FileKind::from_path(document_path).map(|kind| self.extractor_for(kind)) {
      Some(MetadataSupport::Supported(extractor)) => extractor,
      Some(MetadataSupport::Unsupported) | None => return Ok(None),
    };

    let text = extractor.extract(document_path)?.resolve(fallback_title);
    let theme = layout::pick_theme(&mut self.rng);
    let layout = CoverLayout::compose(&text, theme, &self.settings);

    let font = self.fonts.load()?;
    let img = render::render(&layout, &font);

    let filename = cover_filename(document_path);
    let key = self.persist(img, &filename)?;
    Ok(Some(key))
  }

  /// Upload-path wrapper: any failure is logged and becomes `None`.
  pub fn cover_for_upload(&mut self, document_path: &Path, fallback_title: &str) -> Option<String> {
    match self.synthesize_cover(document_path, fallback_title) {
      Ok(Some(key)) => {
        log::info!("generated cover {} for {}", key, document_path.display());
        Some(key)
      }
      Ok(None) => {
        log::debug!("no cover generation for {}", document_path.display());
        None
      }
      Err(err) => {
        log::warn!("cover generation failed for {}: {}", document_path.display(), err);
        None
      }
    }
  }

  // The scratch file is removed when `scratch` drops, on every return path.
  fn persist(&self, img: image::RgbaImage, filename: &str) -> CoverResult<String> {
    fs::create_dir_all(&self.scratch_dir).map_err(persist_error)?;
    let mut scratch = NamedTempFile::new_in(&self.scratch_dir).map_err(persist_error)?;

    {
      let mut writer = BufWriter::new(scratch.as_file_mut());
      render::write_jpeg(img, self.settings.jpeg_quality, &mut writer).map_err(persist_error)?;
      writer.flush().map_err(persist_error)?;
    }

    let bytes = fs::read(scratch.path()).map_err(persist_error)?;
    self.covers
      .store_named(&bytes, filename)
      .map_err(persist_error)
  }
}

fn persist_error(err: impl std::fmt::Display) -> CoverError {
  CoverError::EncodeOrPersistFailed {
    message: err.to_string(),
  }
}

/// `<stem>_cover.jpg`, derived from the stored document's file name.
pub fn cover_filename(document_path: &Path) -> String {
  let stem = document_path
    .file_stem()
    .map(|value| value.to_string_lossy().to_string())
    .filter(|value| !value.is_empty())
    .unwrap_or_else(|| "document".to_string());
  format!("{}_cover.jpg", stem)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{system_font, write_pdf};
  use layout::TextRole;
  use metadata::DocumentMetadata;
  use std::cell::RefCell;
  use std::rc::Rc;

  struct StubExtractor(DocumentMetadata);

  impl MetadataExtractor for StubExtractor {
    fn extract(&self, _path: &Path) -> CoverResult<DocumentMetadata> {
      Ok(self.0.clone())
    }
  }

  struct CountingExtractor(Rc<RefCell<usize>>);

  impl MetadataExtractor for CountingExtractor {
    fn extract(&self, _path: &Path) -> CoverResult<DocumentMetadata> {
      *self.0.borrow_mut() += 1;
      Ok(DocumentMetadata::default())
    }
  }

  fn synthesizer(root: &Path, fonts: Vec<PathBuf>) -> CoverSynthesizer {
    CoverSynthesizer::new(
      CoverSettings {
        palette_seed: Some(1),
        ..CoverSettings::default()
      },
      FontLocator::new(fonts),
      BlobStore::new(root.join("covers")),
      root.join("tmp"),
    )
  }

  fn scratch_is_empty(root: &Path) -> bool {
    match fs::read_dir(root.join("tmp")) {
      Ok(mut entries) => entries.next().is_none(),
      Err(_) => true,
    }
  }

  #[test]
  fn derives_cover_name_from_document_stem() {
    assert_eq!(
      cover_filename(Path::new("/data/documents/3f2a9c.pdf")),
      "3f2a9c_cover.jpg"
    );
  }

  #[test]
  fn non_pdf_documents_are_not_applicable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let counter = Rc::new(RefCell::new(0));
    let mut synth = synthesizer(dir.path(), vec![])
      .with_pdf_extractor(Box::new(CountingExtractor(counter.clone())));

    for name in ["book.epub", "book.mobi", "book.txt"] {
      let path = dir.path().join(name);
      fs::write(&path, b"content").expect("write");
      assert!(matches!(synth.synthesize_cover(&path, "Title"), Ok(None)));
    }
    assert_eq!(*counter.borrow(), 0);
  }

  #[test]
  fn missing_font_is_an_error_and_leaves_nothing_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf = dir.path().join("book.pdf");
    write_pdf(&pdf, Some("Dune"), Some("Frank Herbert"), 2);

    let mut synth = synthesizer(dir.path(), vec![dir.path().join("nope.ttf")]);
    let err = synth.synthesize_cover(&pdf, "Dune").expect_err("no font");
    assert!(matches!(err, CoverError::FontUnavailable { tried: 1 }));
    assert!(synth.cover_for_upload(&pdf, "Dune").is_none());
    assert!(scratch_is_empty(dir.path()));
    assert!(!dir.path().join("covers").join("book_cover.jpg").exists());
  }

  #[test]
  fn corrupt_pdf_becomes_no_cover() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf = dir.path().join("broken.pdf");
    fs::write(&pdf, b"%PDF-garbage").expect("write");

    let mut synth = synthesizer(dir.path(), vec![]);
    assert!(matches!(
      synth.synthesize_cover(&pdf, "Broken"),
      Err(CoverError::MetadataExtractionFailed { .. })
    ));
    assert!(synth.cover_for_upload(&pdf, "Broken").is_none());
  }

  #[test]
  fn stores_jpeg_and_removes_scratch_file() {
    let Some(font) = system_font() else {
      eprintln!("no system font available, skipping");
      return;
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf = dir.path().join("a1b2.pdf");
    write_pdf(&pdf, Some("Dune"), Some("Frank Herbert"), 4);

    let mut synth = synthesizer(dir.path(), vec![font]);
    let key = synth
      .synthesize_cover(&pdf, "Fallback")
      .expect("synthesize")
      .expect("pdf is supported");

    assert_eq!(key, "a1b2_cover.jpg");
    let bytes = fs::read(dir.path().join("covers").join(&key)).expect("read cover");
    assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    let decoded = image::load_from_memory(&bytes).expect("decode");
    assert_eq!((decoded.width(), decoded.height()), (600, 800));
    assert!(scratch_is_empty(dir.path()));
  }

  #[test]
  fn persist_failure_still_removes_scratch_file() {
    let Some(font) = system_font() else {
      eprintln!("no system font available, skipping");
      return;
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let pdf = dir.path().join("book.pdf");
    write_pdf(&pdf, Some("Dune"), None, 1);
    // A regular file where the covers directory should be.
    fs::write(dir.path().join("covers"), b"in the way").expect("write");

    let mut synth = synthesizer(dir.path(), vec![font]);
    let err = synth.synthesize_cover(&pdf, "Dune").expect_err("covers dir blocked");
    assert!(matches!(err, CoverError::EncodeOrPersistFailed { .. }));
    assert!(dir.path().join("tmp").is_dir());
    assert!(scratch_is_empty(dir.path()));
  }

  #[test]
  fn stub_without_title_uses_fallback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let synth = synthesizer(dir.path(), vec![]).with_pdf_extractor(Box::new(StubExtractor(
      DocumentMetadata {
        title: Some(String::new()),
        author: Some(String::new()),
        page_count: None,
      },
    )));

    let extractor = match synth.extractor_for(FileKind::Pdf) {
      MetadataSupport::Supported(extractor) => extractor,
      MetadataSupport::Unsupported => panic!("pdf should be supported"),
    };
    let text = extractor
      .extract(Path::new("ignored.pdf"))
      .expect("stub")
      .resolve("Caller Title");
    let layout = CoverLayout::compose(&text, layout::PALETTE[0], &CoverSettings::default());

    assert_eq!(layout.texts(TextRole::Title), vec!["Caller Title"]);
    assert!(layout.texts(TextRole::Author).is_empty());
    assert_eq!(layout.texts(TextRole::PageCount), vec!["0 pages"]);
  }
}
