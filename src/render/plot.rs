//! Six-panel overview image of a [`FeatureBundle`], written as binary PPM.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::text::TextOverlay;
use crate::audio::features::{FeatureBundle, FeatureGrid};

const BACKGROUND: [u8; 3] = [255, 255, 255];
const AXIS: [u8; 3] = [40, 40, 40];
const TRACE: [u8; 3] = [31, 119, 180];
const TITLE: [u8; 3] = [20, 20, 20];

const MARGIN: u32 = 24;
const TITLE_HEIGHT: u32 = 28;
const TICK_LENGTH: u32 = 6;

/// Viridis anchors, evenly spaced from 0 to 1.
const VIRIDIS: [[f32; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

/// RGB raster, row-major, three bytes per pixel.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fill: [u8; 3]) -> Self {
        let pixels = fill
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.index(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    /// Out-of-bounds writes are dropped.
    pub fn set(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        self.pixels[i..i + 3].copy_from_slice(&color);
    }

    pub fn blend(&mut self, x: u32, y: u32, color: [u8; 3], alpha: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        let i = self.index(x, y);
        for c in 0..3 {
            let old = self.pixels[i + c] as f32;
            self.pixels[i + c] = (color[c] as f32 * a + old * (1.0 - a)).round() as u8;
        }
    }

    pub fn outline(&mut self, rect: Rect, color: [u8; 3]) {
        if rect.w == 0 || rect.h == 0 {
            return;
        }
        for x in rect.x..rect.x + rect.w {
            self.set(x, rect.y, color);
            self.set(x, rect.y + rect.h - 1, color);
        }
        for y in rect.y..rect.y + rect.h {
            self.set(rect.x, y, color);
            self.set(rect.x + rect.w - 1, y, color);
        }
    }

    /// Bresenham line between two points.
    pub fn line(&mut self, from: (i32, i32), to: (i32, i32), color: [u8; 3]) {
        let (mut x0, mut y0) = from;
        let (x1, y1) = to;
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            if x0 >= 0 && y0 >= 0 {
                self.set(x0 as u32, y0 as u32, color);
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    pub fn write_ppm<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(&self.pixels)?;
        out.flush()
    }

    pub fn save_ppm(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_ppm(BufWriter::new(file))
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 1500,
            height: 1000,
        }
    }
}

/// Map `t` in [0, 1] onto viridis. Values outside are clamped; NaN maps to
/// the low end.
pub fn colormap(t: f32) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - i as f32;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    [
        (a[0] + (b[0] - a[0]) * frac).round() as u8,
        (a[1] + (b[1] - a[1]) * frac).round() as u8,
        (a[2] + (b[2] - a[2]) * frac).round() as u8,
    ]
}

/// Where the plot for `input` goes: `<dir>/<stem>_analysis.ppm`, current
/// directory when `dir` is `None`.
pub fn plot_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let name = format!("{}_analysis.ppm", stem);
    match dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Pixel offsets, relative to the panel's left edge, of each whole second
/// along a time axis of `num_frames` frames drawn `width` pixels wide.
pub fn second_ticks(
    num_frames: usize,
    sample_rate: u32,
    hop_length: usize,
    width: u32,
) -> Vec<u32> {
    if num_frames == 0 || width == 0 {
        return Vec::new();
    }
    let frames_per_second = sample_rate as f64 / hop_length as f64;
    (0..)
        .map(|s| s as f64 * frames_per_second)
        .take_while(|&f| f < num_frames as f64)
        .map(|f| ((f / num_frames as f64) * width as f64) as u32)
        .collect()
}

/// Panel rectangles for a `rows × cols` layout inside a `width × height`
/// image, row-major. Each panel leaves room for a title above and ticks below.
pub fn panel_layout(width: u32, height: u32, rows: u32, cols: u32) -> Vec<Rect> {
    let cell_w = width / cols;
    let cell_h = height / rows;
    let inner_w = cell_w.saturating_sub(2 * MARGIN);
    let inner_h = cell_h.saturating_sub(TITLE_HEIGHT + MARGIN + TICK_LENGTH);
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .map(|(r, c)| Rect {
            x: c * cell_w + MARGIN,
            y: r * cell_h + TITLE_HEIGHT,
            w: inner_w,
            h: inner_h,
        })
        .collect()
}

/// Left edge of a title `text_width` pixels wide, centered over `rect`.
/// Titles wider than the panel start at its left edge.
pub fn title_x(rect: Rect, text_width: u32) -> u32 {
    rect.x + rect.w.saturating_sub(text_width) / 2
}

enum Panel<'a> {
    Heatmap(&'a FeatureGrid),
    Curve(&'a [f32]),
}

/// Render the overview: mel spectrogram, pitch content, timbre, volume,
/// transitions and onset strength, in a 3 × 2 grid.
pub fn render_analysis(
    bundle: &FeatureBundle,
    options: PlotOptions,
    font: Option<&TextOverlay>,
) -> Canvas {
    let mut canvas = Canvas::new(options.width, options.height, BACKGROUND);
    let panels = [
        ("Mel spectrogram (dB)", Panel::Heatmap(&bundle.mel_spectrogram)),
        ("Pitch content", Panel::Heatmap(&bundle.pitch_content)),
        ("Timbre", Panel::Heatmap(&bundle.timbre)),
        ("Volume", Panel::Curve(&bundle.volume)),
        ("Transitions", Panel::Curve(&bundle.transitions)),
        ("Onset strength", Panel::Curve(&bundle.onsets)),
    ];
    let rects = panel_layout(options.width, options.height, 3, 2);
    let num_frames = bundle.num_frames();

    for ((title, panel), rect) in panels.iter().zip(rects) {
        if rect.w < 2 || rect.h < 2 {
            continue;
        }
        match panel {
            Panel::Heatmap(grid) => draw_heatmap(&mut canvas, rect, grid),
            Panel::Curve(values) => draw_curve(&mut canvas, rect, values),
        }
        canvas.outline(rect, AXIS);
        for dx in second_ticks(num_frames, bundle.sample_rate, bundle.hop_length, rect.w) {
            let x = rect.x + dx;
            for y in rect.y + rect.h..rect.y + rect.h + TICK_LENGTH {
                canvas.set(x, y, AXIS);
            }
        }
        if let Some(font) = font {
            let slack = TITLE_HEIGHT.saturating_sub(font.font_size() as u32);
            let y = rect.y.saturating_sub(TITLE_HEIGHT) + slack / 2;
            let x = title_x(rect, font.measure_width(title));
            font.composite(&mut canvas, title, x, y, TITLE);
        }
    }

    canvas
}

/// Row 0 sits at the bottom of the panel.
fn draw_heatmap(canvas: &mut Canvas, rect: Rect, grid: &FeatureGrid) {
    if grid.rows() == 0 || grid.frames() == 0 {
        return;
    }
    let (lo, hi) = grid.range();
    let span = hi - lo;
    for py in 0..rect.h {
        let row = grid.rows() - 1 - (py as usize * grid.rows() / rect.h as usize);
        for px in 0..rect.w {
            let t = px as usize * grid.frames() / rect.w as usize;
            let v = grid.get(row, t);
            let norm = if span > 0.0 { (v - lo) / span } else { 0.0 };
            canvas.set(rect.x + px, rect.y + py, colormap(norm));
        }
    }
}

fn draw_curve(canvas: &mut Canvas, rect: Rect, values: &[f32]) {
    if values.is_empty() {
        return;
    }
    let lo = values.iter().copied().fold(f32::INFINITY, f32::min).min(0.0);
    let hi = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = if hi > lo { hi - lo } else { 1.0 };

    let n = values.len();
    let to_point = |i: usize| {
        let x = if n > 1 {
            rect.x as f32 + i as f32 / (n - 1) as f32 * (rect.w - 1) as f32
        } else {
            rect.x as f32
        };
        let y = (rect.y + rect.h - 1) as f32 - (values[i] - lo) / span * (rect.h - 1) as f32;
        (x.round() as i32, y.round() as i32)
    };

    let mut prev = to_point(0);
    canvas.line(prev, prev, TRACE);
    for i in 1..n {
        let next = to_point(i);
        canvas.line(prev, next, TRACE);
        prev = next;
    }
}

/// Render and write the overview image for `bundle` to `path`.
pub fn save_plot(
    bundle: &FeatureBundle,
    path: &Path,
    options: PlotOptions,
    font: Option<&TextOverlay>,
) -> Result<()> {
    let canvas = render_analysis(bundle, options, font);
    canvas.save_ppm(path)?;
    log::info!("Plot written to {}", path.display());
    Ok(())
}
