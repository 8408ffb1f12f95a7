//! Personal e-book library: books, reading progress, tagged notes and
//! generated placeholder covers, stored in SQLite with files on disk.

pub mod config;
pub mod cover;
pub mod db;
pub mod error;
pub mod library;
pub mod models;
pub mod policy;
pub mod seed;
pub mod storage;

pub use config::LibraryConfig;
pub use error::{LibraryError, LibraryResult};
pub use library::Library;

#[cfg(test)]
pub(crate) mod test_support {
  use lopdf::{dictionary, Dictionary, Document, Object, Stream};
  use std::path::{Path, PathBuf};
  use tempfile::TempDir;

  use crate::config::{default_font_candidates, CoverSettings};
  use crate::cover::font::FontLocator;
  use crate::cover::CoverSynthesizer;
  use crate::db;
  use crate::library::{BookFields, Library, UploadRequest, UploadedFile};
  use crate::models::{Book, User};
  use crate::seed::seed_categories;
  use crate::storage::BlobStore;

  /// Minimal PDF with `pages` blank pages and an optional Info dictionary.
  pub fn write_pdf(path: &Path, title: Option<&str>, author: Option<&str>, pages: u32) {
    let info = if title.is_some() || author.is_some() {
      let mut info = Dictionary::new();
      if let Some(title) = title {
        info.set("Title", Object::string_literal(title));
      }
      if let Some(author) = author {
        info.set("Author", Object::string_literal(author));
      }
      Some(info)
    } else {
      None
    };
    write_pdf_with_info(path, info, pages);
  }

  /// Like [`write_pdf`] but with a caller-built Info dictionary, for raw string bytes.
  pub fn write_pdf_with_info(path: &Path, info: Option<Dictionary>, pages: u32) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
      let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
      let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
      });
      kids.push(page_id.into());
    }
    doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
      }),
    );
    let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(info) = info {
      let info_id = doc.add_object(info);
      doc.trailer.set("Info", info_id);
    }

    doc.save(path).expect("save pdf");
  }

  pub fn system_font() -> Option<PathBuf> {
    FontLocator::new(default_font_candidates()).locate().ok()
  }

  /// A library in a temp dir with the stock categories seeded.
  pub struct TestLibrary {
    pub dir: TempDir,
    pub library: Library,
  }

  impl TestLibrary {
    /// No font candidates: cover generation runs but always gives up.
    pub fn new() -> Self {
      TestLibrary::with_fonts(Vec::new())
    }

    pub fn with_fonts(fonts: Vec<PathBuf>) -> Self {
      TestLibrary::build(|synth| synth, fonts)
    }

    pub fn build(
      customize: impl FnOnce(CoverSynthesizer) -> CoverSynthesizer,
      fonts: Vec<PathBuf>,
    ) -> Self {
      let dir = tempfile::tempdir().expect("tempdir");
      let mut conn = db::open_in_memory().expect("open db");
      seed_categories(&mut conn).expect("seed");

      let covers = BlobStore::new(dir.path().join("covers"));
      let synth = CoverSynthesizer::new(
        CoverSettings {
          palette_seed: Some(3),
          ..CoverSettings::default()
        },
        FontLocator::new(fonts),
        covers.clone(),
        dir.path().join("tmp"),
      );
      let library = Library::from_parts(
        conn,
        BlobStore::new(dir.path().join("documents")),
        covers,
        customize(synth),
        20,
      );
      TestLibrary { dir, library }
    }

    pub fn user(&mut self, email: &str) -> User {
      let name = email.split('@').next().unwrap_or(email).to_string();
      self.library.create_user(&name, email).expect("create user")
    }

    /// Write `bytes` to a fresh upload temp file named like the client's file.
    pub fn incoming(&self, name: &str, bytes: &[u8]) -> UploadedFile {
      let incoming = self.dir.path().join("incoming");
      std::fs::create_dir_all(&incoming).expect("incoming dir");
      let path = incoming.join(format!("upload-{}", uuid::Uuid::new_v4().simple()));
      std::fs::write(&path, bytes).expect("write upload");
      UploadedFile::with_name(path, name)
    }

    pub fn incoming_pdf(&self, name: &str, title: Option<&str>) -> UploadedFile {
      let incoming = self.dir.path().join("incoming");
      std::fs::create_dir_all(&incoming).expect("incoming dir");
      let path = incoming.join(format!("upload-{}", uuid::Uuid::new_v4().simple()));
      write_pdf(&path, title, Some("Frank Herbert"), 2);
      UploadedFile::with_name(path, name)
    }

    pub fn incoming_png(&self, name: &str) -> UploadedFile {
      let incoming = self.dir.path().join("incoming");
      std::fs::create_dir_all(&incoming).expect("incoming dir");
      let path = incoming.join(format!("upload-{}.png", uuid::Uuid::new_v4().simple()));
      image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
        .save(&path)
        .expect("save png");
      UploadedFile::with_name(path, name)
    }

    pub fn upload_epub(&mut self, user: &User, title: &str) -> Book {
      let file = self.incoming(&format!("{}.epub", title), b"PK\x03\x04epub");
      self.library
        .upload_book(
          user,
          UploadRequest {
            fields: BookFields {
              title: title.to_string(),
              ..BookFields::default()
            },
            file,
            cover_image: None,
          },
        )
        .expect("upload epub")
    }
  }
}
