use lopdf::{Dictionary, Document, Object};
use std::path::Path;

use super::{CoverError, CoverResult};

/// Title/author/page count embedded in a document, as far as the format exposes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
  pub title: Option<String>,
  pub author: Option<String>,
  pub page_count: Option<u32>,
}

/// Metadata with every default applied; what a cover actually shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverText {
  pub title: String,
  pub author: String,
  pub pages: u32,
}

impl DocumentMetadata {
  pub fn resolve(self, fallback_title: &str) -> CoverText {
    let title = self
      .title
      .map(|value| value.trim().to_string())
      .filter(|value| !value.is_empty())
      .unwrap_or_else(|| fallback_title.trim().to_string());
    let author = self
      .author
      .map(|value| value.trim().to_string())
      .unwrap_or_default();
    CoverText {
      title,
      author,
      pages: self.page_count.unwrap_or(0),
    }
  }
}

pub trait MetadataExtractor {
  fn extract(&self, path: &Path) -> CoverResult<DocumentMetadata>;
}

/// Whether a document format can feed the cover generator.
pub enum MetadataSupport<'a> {
  Supported(&'a dyn MetadataExtractor),
  Unsupported,
}

/// Reads the PDF Info dictionary and page tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfMetadataExtractor;

impl MetadataExtractor for PdfMetadataExtractor {
  fn extract(&self, path: &Path) -> CoverResult<DocumentMetadata> {
    let doc = Document::load(path).map_err(|err| CoverError::MetadataExtractionFailed {
      path: path.to_path_buf(),
      message: err.to_string(),
    })?;

    let mut metadata = DocumentMetadata::default();
    if let Some(info) = info_dictionary(&doc) {
      metadata.title = dict_string(info, b"Title");
      metadata.author = dict_string(info, b"Author");
    }
    metadata.page_count = u32::try_from(doc.get_pages().len()).ok();
    Ok(metadata)
  }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
  match doc.trailer.get(b"Info").ok()? {
    Object::Reference(id) => doc.get_dictionary(*id).ok(),
    Object::Dictionary(dict) => Some(dict),
    _ => None,
  }
}

fn dict_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
  let value = dict.get(key).ok()?;
  let text = match value {
    Object::String(data, _) => decode_text_string(data),
    Object::Name(name) => String::from_utf8_lossy(name).to_string(),
    _ => return None,
  };
  let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

// PDF text strings are UTF-16BE with a BOM, UTF-8 with a BOM (PDF 2.0), or
// single-byte PDFDocEncoding.
fn decode_text_string(data: &[u8]) -> String {
  if let Some(rest) = data.strip_prefix(&[0xFE, 0xFF]) {
    let units: Vec<u16> = rest
      .chunks_exact(2)
      .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
      .collect();
    return String::from_utf16_lossy(&units);
  }
  if let Some(rest) = data.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
    return String::from_utf8_lossy(rest).to_string();
  }
  data.iter().map(|&byte| pdf_doc_char(byte)).collect()
}

// PDFDocEncoding agrees with Latin-1 except in 0x18..=0x1F and 0x80..=0xA0.
fn pdf_doc_char(byte: u8) -> char {
  match byte {
    0x18 => '\u{02D8}',
    0x19 => '\u{02C7}',
    0x1A => '\u{02C6}',
    0x1B => '\u{02D9}',
    0x1C => '\u{02DD}',
    0x1D => '\u{02DB}',
    0x1E => '\u{02DA}',
    0x1F => '\u{02DC}',
    0x80 => '\u{2022}',
    0x81 => '\u{2020}',
    0x82 => '\u{2021}',
    0x83 => '\u{2026}',
    0x84 => '\u{2014}',
    0x85 => '\u{2013}',
    0x86 => '\u{0192}',
    0x87 => '\u{2044}',
    0x88 => '\u{2039}',
    0x89 => '\u{203A}',
    0x8A => '\u{2212}',
    0x8B => '\u{2030}',
    0x8C => '\u{201E}',
    0x8D => '\u{201C}',
    0x8E => '\u{201D}',
    0x8F => '\u{2018}',
    0x90 => '\u{2019}',
    0x91 => '\u{201A}',
    0x92 => '\u{2122}',
    0x93 => '\u{FB01}',
    0x94 => '\u{FB02}',
    0x95 => '\u{0141}',
    0x96 => '\u{0152}',
    0x97 => '\u{0160}',
    0x98 => '\u{0178}',
    0x99 => '\u{017D}',
    0x9A => '\u{0131}',
    0x9B => '\u{0142}',
    0x9C => '\u{0153}',
    0x9D => '\u{0161}',
    0x9E => '\u{017E}',
    0x9F => '\u{FFFD}',
    0xA0 => '\u{20AC}',
    other => other as char,
  }
}
