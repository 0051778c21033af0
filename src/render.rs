//! Draws train arrows and ids over the base map image.

use crate::logging::{log_info, log_warn};
use crate::train::{Direction, TrainMarker};
use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

const LINE_WIDTH: i32 = 4;
const GLYPH_SCALE: i32 = 2;

type Point = (i32, i32);

/// Arrow shape per direction, relative to the train position:
/// tail, head, two barb ends, label origin.
pub fn arrow_offsets(direction: Direction) -> Option<[Point; 5]> {
    Some(match direction {
        Direction::N => [(0, 10), (0, -10), (-5, -5), (5, -5), (-24, 0)],
        Direction::S => [(0, -10), (0, 10), (-5, 5), (5, 5), (8, 0)],
        Direction::E => [(-10, 0), (10, 0), (5, 5), (5, -5), (-16, -12)],
        Direction::W => [(10, 0), (-10, 0), (-5, 5), (-5, -5), (0, 5)],
        Direction::U => [(5, 8), (-6, -9), (-6, -1), (0, -5), (-8, 8)],
        Direction::D => [(-6, -9), (5, 8), (6, 1), (0, 5), (8, 8)],
        Direction::Unknown => return None,
    })
}

/// Shaft plus the two barbs, all anchored at the arrow head.
pub fn arrow_parts(at: Point, os: &[Point; 5]) -> [(Point, Point); 3] {
    let p = |i: usize| (at.0 + os[i].0, at.1 + os[i].1);
    [(p(0), p(1)), (p(1), p(2)), (p(1), p(3))]
}

pub struct MapRenderer {
    base: PathBuf,
    output: PathBuf,
}

impl MapRenderer {
    pub fn new(base: &Path, output: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            output: output.to_path_buf(),
        }
    }

    /// Composites `markers` onto the base map and replaces the output image.
    /// The output is only touched once the new image is fully encoded.
    pub fn render(&self, markers: &[TrainMarker]) -> Result<()> {
        let mut img = image::open(&self.base)
            .with_context(|| format!("opening base map {}", self.base.display()))?
            .to_rgba8();
        draw_markers(&mut img, markers);

        let dir = match self.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        img.write_to(tmp.as_file_mut(), ImageFormat::Png)
            .context("encoding annotated map")?;
        tmp.persist(&self.output)
            .with_context(|| format!("writing {}", self.output.display()))?;

        log_info(&format!(
            "Drew {} trains to {}",
            markers.len(),
            self.output.display()
        ));
        Ok(())
    }
}

pub fn draw_markers(img: &mut RgbaImage, markers: &[TrainMarker]) {
    for m in markers {
        let Some(os) = arrow_offsets(m.direction) else {
            log_warn(&format!("Train {} has no arrow for direction {}", m.id, m.direction));
            continue;
        };
        let colour = Rgba(m.colour.rgba());
        let at = (m.x.round() as i32, m.y.round() as i32);
        for (from, to) in arrow_parts(at, &os) {
            paint_line(img, from, to, colour);
        }
        paint_text(img, (at.0 + os[4].0, at.1 + os[4].1), &m.id, colour);
    }
}

fn put(img: &mut RgbaImage, x: i32, y: i32, colour: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

/// Bresenham walk stamping a `LINE_WIDTH` square brush at each step.
fn paint_line(img: &mut RgbaImage, from: Point, to: Point, colour: Rgba<u8>) {
    let (x1, y1) = to;
    let dx = (x1 - from.0).abs();
    let dy = -(y1 - from.1).abs();
    let sx = if from.0 < x1 { 1 } else { -1 };
    let sy = if from.1 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut cx, mut cy) = from;
    let lo = -LINE_WIDTH / 2;
    let hi = lo + LINE_WIDTH;

    loop {
        for oy in lo..hi {
            for ox in lo..hi {
                put(img, cx + ox, cy + oy, colour);
            }
        }
        if cx == x1 && cy == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            cx += sx;
        }
        if e2 <= dx {
            err += dx;
            cy += sy;
        }
    }
}

// 3x5 glyphs, one byte per row, bit 2 is the leftmost column.
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        ' ' => [0; 5],
        _ => [0b111; 5],
    }
}

fn paint_text(img: &mut RgbaImage, origin: Point, text: &str, colour: Rgba<u8>) {
    let advance = 4 * GLYPH_SCALE;
    for (i, c) in text.chars().enumerate() {
        let gx = origin.0 + i as i32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100u8 >> col) == 0 {
                    continue;
                }
                let px = gx + col * GLYPH_SCALE;
                let py = origin.1 + row as i32 * GLYPH_SCALE;
                for oy in 0..GLYPH_SCALE {
                    for ox in 0..GLYPH_SCALE {
                        put(img, px + ox, py + oy, colour);
                    }
                }
            }
        }
    }
}
