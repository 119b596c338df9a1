use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

use super::plot::Canvas;

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read font: {}", path.display()))?;
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Invalid font {}: {}", path.display(), e))?;
        Ok(Self { font, font_size })
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    /// Draw `text` with its top-left corner at (x, y), alpha-blended over
    /// whatever the canvas already holds.
    pub fn composite(&self, canvas: &mut Canvas, text: &str, x: u32, y: u32, color: [u8; 3]) {
        let mut cursor_x = x as i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y as i32 + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha == 0 {
                        continue;
                    }
                    let px = cursor_x + metrics.xmin + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 {
                        continue;
                    }
                    canvas.blend(px as u32, py as u32, color, alpha as f32 / 255.0);
                }
            }

            cursor_x += metrics.advance_width.round() as i32;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}
