use ab_glyph::{Font, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageResult, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut, text_size, Blend};
use std::io::Write;

use super::layout::{CoverLayout, ACCENT_ALPHA};

/// Rasterize a composed layout: background, corner circles, then centered text.
pub fn render(layout: &CoverLayout, font: &impl Font) -> RgbaImage {
  let [bg_r, bg_g, bg_b] = layout.theme.background;
  let [fg_r, fg_g, fg_b] = layout.theme.foreground;

  let background = RgbaImage::from_pixel(layout.width, layout.height, Rgba([bg_r, bg_g, bg_b, 255]));

  // Blend so the circles tint the background instead of replacing it.
  let accent = Rgba([fg_r, fg_g, fg_b, ACCENT_ALPHA]);
  let mut blended = Blend(background);
  for (center, radius) in layout.accent_circles() {
    draw_filled_circle_mut(&mut blended, center, radius, accent);
  }
  let mut img = blended.0;

  let ink = Rgba([fg_r, fg_g, fg_b, 255]);
  for element in &layout.elements {
    let scale = PxScale::from(element.size);
    let (text_width, _) = text_size(scale, font, &element.text);
    let x = ((layout.width as i32 - text_width as i32) / 2).max(0);
    draw_text_mut(&mut img, ink, x, element.y, scale, font, &element.text);
  }

  img
}

/// Encode as baseline JPEG. The alpha channel is dropped.
pub fn write_jpeg<W: Write>(img: RgbaImage, quality: u8, writer: W) -> ImageResult<()> {
  let rgb = DynamicImage::ImageRgba8(img).into_rgb8();
  let encoder = JpegEncoder::new_with_quality(writer, quality);
  encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
}
