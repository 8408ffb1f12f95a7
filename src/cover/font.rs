use ab_glyph::FontVec;
use std::path::PathBuf;

use super::{CoverError, CoverResult};

/// Ordered list of font files to try; the first one that exists wins.
#[derive(Debug, Clone)]
pub struct FontLocator {
  candidates: Vec<PathBuf>,
}

impl FontLocator {
  pub fn new(candidates: Vec<PathBuf>) -> Self {
    FontLocator { candidates }
  }

  pub fn locate(&self) -> CoverResult<PathBuf> {
    self.candidates
      .iter()
      .find(|path| path.is_file())
      .cloned()
      .ok_or(CoverError::FontUnavailable {
        tried: self.candidates.len(),
      })
  }

  /// Locate and parse the first usable font.
  ///
  /// A located file that cannot be read or parsed counts as unavailable too.
  pub fn load(&self) -> CoverResult<FontVec> {
    let path = self.locate()?;
    let unavailable = CoverError::FontUnavailable {
      tried: self.candidates.len(),
    };
    let data = std::fs::read(&path).map_err(|err| {
      log::warn!("cannot read font {}: {}", path.display(), err);
      unavailable.clone()
    })?;
    let font = FontVec::try_from_vec(data).map_err(|err| {
      log::warn!("cannot parse font {}: {}", path.display(), err);
      unavailable
    })?;
    log::debug!("cover font: {}", path.display());
    Ok(font)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_existing_candidate_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let second = dir.path().join("second.ttf");
    let third = dir.path().join("third.ttf");
    std::fs::write(&second, b"font").expect("write");
    std::fs::write(&third, b"font").expect("write");

    let locator = FontLocator::new(vec![dir.path().join("missing.ttf"), second.clone(), third]);
    assert_eq!(locator.locate().expect("locate"), second);
  }

  #[test]
  fn directories_do_not_count_as_fonts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let locator = FontLocator::new(vec![dir.path().to_path_buf()]);
    assert!(matches!(
      locator.locate(),
      Err(CoverError::FontUnavailable { tried: 1 })
    ));
  }

  #[test]
  fn garbage_font_file_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bogus = dir.path().join("bogus.ttf");
    std::fs::write(&bogus, b"not a font").expect("write");

    let locator = FontLocator::new(vec![bogus]);
    assert!(matches!(
      locator.load(),
      Err(CoverError::FontUnavailable { tried: 1 })
    ));
  }

  #[test]
  fn empty_list_is_unavailable() {
    let locator = FontLocator::new(vec![]);
    assert!(matches!(
      locator.load(),
      Err(CoverError::FontUnavailable { tried: 0 })
    ));
  }
}
