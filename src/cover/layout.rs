//! Placement of cover text, independent of any font.
//!
//! Positions here are vertical only; horizontal centering needs glyph
//! metrics and happens at render time.

use rand::Rng;

use super::metadata::CoverText;
use crate::config::CoverSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
  pub background: [u8; 3],
  pub foreground: [u8; 3],
}

pub const PALETTE: &[Theme] = &[
  Theme { background: [44, 62, 80], foreground: [236, 240, 241] },
  Theme { background: [142, 68, 173], foreground: [255, 255, 255] },
  Theme { background: [39, 174, 96], foreground: [255, 255, 255] },
  Theme { background: [192, 57, 43], foreground: [253, 246, 227] },
  Theme { background: [211, 84, 0], foreground: [255, 255, 255] },
  Theme { background: [22, 160, 133], foreground: [236, 240, 241] },
  Theme { background: [250, 245, 235], foreground: [60, 50, 40] },
];

/// Alpha of the decorative corner circles.
pub const ACCENT_ALPHA: u8 = 40;

const TITLE_SIZE: f32 = 52.0;
const TITLE_LINE_HEIGHT: i32 = 66;
const AUTHOR_SIZE: f32 = 30.0;
const AUTHOR_GAP: i32 = 40;
const PAGES_SIZE: f32 = 24.0;
const PAGES_BOTTOM_MARGIN: i32 = 90;

pub fn pick_theme<R: Rng + ?Sized>(rng: &mut R) -> Theme {
  PALETTE[rng.gen_range(0..PALETTE.len())]
}

/// Split a title into fixed-width chunks of `max_chars` characters, keeping
/// at most `max_lines` of them.
///
/// This counts characters, not glyph widths, and happily cuts through the
/// middle of a word. Anything past the last kept chunk is dropped.
pub fn wrap_title(title: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
  let chars: Vec<char> = title.chars().collect();
  chars
    .chunks(max_chars.max(1))
    .take(max_lines)
    .map(|chunk| chunk.iter().collect())
    .collect()
}

pub fn page_label(pages: u32) -> String {
  format!("{} pages", pages)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
  Title,
  Author,
  PageCount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
  pub role: TextRole,
  pub text: String,
  pub size: f32,
  /// Top edge of the line in pixels.
  pub y: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverLayout {
  pub width: u32,
  pub height: u32,
  pub theme: Theme,
  pub elements: Vec<TextElement>,
}

impl CoverLayout {
  pub fn compose(text: &CoverText, theme: Theme, settings: &CoverSettings) -> Self {
    let height = settings.height as i32;
    let mut elements = Vec::new();

    let title_top = height * 3 / 10;
    let lines = wrap_title(&text.title, settings.max_chars_per_line, settings.max_title_lines);
    let line_count = lines.len() as i32;
    for (index, line) in lines.into_iter().enumerate() {
      elements.push(TextElement {
        role: TextRole::Title,
        text: line,
        size: TITLE_SIZE,
        y: title_top + index as i32 * TITLE_LINE_HEIGHT,
      });
    }

    if !text.author.is_empty() {
      elements.push(TextElement {
        role: TextRole::Author,
        text: text.author.clone(),
        size: AUTHOR_SIZE,
        y: title_top + line_count * TITLE_LINE_HEIGHT + AUTHOR_GAP,
      });
    }

    elements.push(TextElement {
      role: TextRole::PageCount,
      text: page_label(text.pages),
      size: PAGES_SIZE,
      y: height - PAGES_BOTTOM_MARGIN,
    });

    CoverLayout {
      width: settings.width,
      height: settings.height,
      theme,
      elements,
    }
  }

  pub fn texts(&self, role: TextRole) -> Vec<&str> {
    self.elements
      .iter()
      .filter(|element| element.role == role)
      .map(|element| element.text.as_str())
      .collect()
  }

  /// Center and radius of the two decorative circles, top-left and bottom-right.
  pub fn accent_circles(&self) -> [((i32, i32), i32); 2] {
    let radius = (self.width.max(self.height) / 2) as i32;
    [
      ((0, 0), radius),
      ((self.width as i32, self.height as i32), radius),
    ]
  }
}
