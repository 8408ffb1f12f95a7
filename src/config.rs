//! Library configuration.
//!
//! Everything lives under one data directory (`~/.local/share/shelf` by
//! default). An optional TOML file can override any field:
//!
//! ```toml
//! data_dir = "/srv/shelf"
//! per_page = 20
//! font_candidates = ["/usr/share/fonts/TTF/DejaVuSans-Bold.ttf"]
//!
//! [cover]
//! jpeg_quality = 85
//! palette_seed = 7
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LibraryError, LibraryResult};

const DEFAULT_PER_PAGE: u32 = 20;

/// Well-known font files across Linux, macOS and Windows, tried in order.
const DEFAULT_FONT_CANDIDATES: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
  "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
  "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
  "/Library/Fonts/Arial.ttf",
  "C:\\Windows\\Fonts\\arialbd.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
  pub data_dir: PathBuf,
  pub per_page: u32,
  pub font_candidates: Vec<PathBuf>,
  pub cover: CoverSettings,
}

/// Canvas and layout knobs for generated covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSettings {
  pub width: u32,
  pub height: u32,
  pub jpeg_quality: u8,
  pub max_chars_per_line: usize,
  pub max_title_lines: usize,
  /// Fixed seed for palette selection; `None` seeds from OS entropy.
  pub palette_seed: Option<u64>,
}

impl Default for CoverSettings {
  fn default() -> Self {
    CoverSettings {
      width: 600,
      height: 800,
      jpeg_quality: 90,
      max_chars_per_line: 20,
      max_title_lines: 3,
      palette_seed: None,
    }
  }
}

impl Default for LibraryConfig {
  fn default() -> Self {
    let data_dir = dirs::data_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join("shelf");
    LibraryConfig::with_data_dir(data_dir)
  }
}

impl LibraryConfig {
  pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
    LibraryConfig {
      data_dir: data_dir.into(),
      per_page: DEFAULT_PER_PAGE,
      font_candidates: default_font_candidates(),
      cover: CoverSettings::default(),
    }
  }

  /// Read a TOML config file; missing fields keep their defaults.
  pub fn load(path: &Path) -> LibraryResult<Self> {
    let raw = std::fs::read_to_string(path).map_err(|err| LibraryError::Config {
      message: format!("read {}: {}", path.display(), err),
    })?;
    let config: LibraryConfig = toml::from_str(&raw).map_err(|err| LibraryError::Config {
      message: format!("parse {}: {}", path.display(), err),
    })?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> LibraryResult<()> {
    if self.per_page == 0 {
      return Err(LibraryError::Config {
        message: "per_page must be at least 1".to_string(),
      });
    }
    if self.cover.max_chars_per_line == 0 || self.cover.max_title_lines == 0 {
      return Err(LibraryError::Config {
        message: "cover title wrapping needs at least one line of one character"
          .to_string(),
      });
    }
    // JPEG stores each dimension in 16 bits.
    let sides = 1..=u32::from(u16::MAX);
    if !sides.contains(&self.cover.width) || !sides.contains(&self.cover.height) {
      return Err(LibraryError::Config {
        message: format!(
          "cover size {}x{} must be between 1 and {} on each side",
          self.cover.width,
          self.cover.height,
          u16::MAX
        ),
      });
    }
    if !(1..=100).contains(&self.cover.jpeg_quality) {
      return Err(LibraryError::Config {
        message: format!("jpeg_quality {} is outside 1-100", self.cover.jpeg_quality),
      });
    }
    Ok(())
  }

  pub fn database_path(&self) -> PathBuf {
    self.data_dir.join("shelf.db")
  }

  pub fn documents_dir(&self) -> PathBuf {
    self.data_dir.join("documents")
  }

  pub fn covers_dir(&self) -> PathBuf {
    self.data_dir.join("covers")
  }

  /// Scratch space for intermediate cover rasters.
  pub fn scratch_dir(&self) -> PathBuf {
    self.data_dir.join("tmp")
  }
}

pub fn default_font_candidates() -> Vec<PathBuf> {
  DEFAULT_FONT_CANDIDATES.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shelf.toml");
    std::fs::write(
      &path,
      "data_dir = \"/tmp/shelf-test\"\n\n[cover]\npalette_seed = 7\n",
    )
    .expect("write config");

    let config = LibraryConfig::load(&path).expect("load config");
    assert_eq!(config.data_dir, PathBuf::from("/tmp/shelf-test"));
    assert_eq!(config.per_page, 20);
    assert_eq!(config.cover.palette_seed, Some(7));
    assert_eq!(config.cover.width, 600);
    assert_eq!(config.cover.max_title_lines, 3);
    assert!(!config.font_candidates.is_empty());
    assert_eq!(config.covers_dir(), PathBuf::from("/tmp/shelf-test/covers"));
  }

  #[test]
  fn rejects_zero_page_size() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shelf.toml");
    std::fs::write(&path, "per_page = 0\n").expect("write config");

    let err = LibraryConfig::load(&path).expect_err("zero per_page");
    assert!(matches!(err, LibraryError::Config { .. }));
  }

  #[test]
  fn rejects_unencodable_cover_sizes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shelf.toml");
    for body in ["[cover]\nwidth = 0\n", "[cover]\nheight = 70000\n"] {
      std::fs::write(&path, body).expect("write config");
      let err = LibraryConfig::load(&path).expect_err(body);
      assert!(matches!(err, LibraryError::Config { .. }));
    }

    std::fs::write(&path, "[cover]\nwidth = 65535\nheight = 1\n").expect("write config");
    let config = LibraryConfig::load(&path).expect("largest side");
    assert_eq!(config.cover.width, 65535);
  }
}
