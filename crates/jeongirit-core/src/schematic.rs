//! Schematic drawings for the series-circuit practice problem.
//!
//! Both renderers draw the same loop on a 360×240 canvas: the source on
//! the left, R1 along the top, R2 down the right side. PNG is the default:
//! the web client embeds the image as a `data:image/png` URL.

use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const WIDTH: u32 = 360;
pub const HEIGHT: u32 = 240;

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([17, 24, 39]);

/// Output encoding of a schematic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchematicFormat {
    #[default]
    Png,
    Svg,
}

impl SchematicFormat {
    pub fn mime(self) -> &'static str {
        match self {
            SchematicFormat::Png => "image/png",
            SchematicFormat::Svg => "image/svg+xml",
        }
    }

    /// Encoded schematic bytes for a `v` volt source driving `r1` and `r2`.
    pub fn render(self, v: f64, r1: f64, r2: f64) -> Result<Vec<u8>> {
        match self {
            SchematicFormat::Png => render_png(v, r1, r2),
            SchematicFormat::Svg => Ok(render_svg(v, r1, r2).into_bytes()),
        }
    }
}

impl FromStr for SchematicFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(SchematicFormat::Png),
            "svg" => Ok(SchematicFormat::Svg),
            other => Err(Error::InvalidArgument(format!(
                "unknown image format '{}' (expected png or svg)",
                other
            ))),
        }
    }
}

/// Formats ohms with a k suffix from 1 kΩ up.
pub(crate) fn ohms_label(ohms: f64) -> String {
    if ohms >= 1000.0 {
        format!("{}k", ohms / 1000.0)
    } else {
        format!("{}", ohms)
    }
}

// ============ Geometry ============

const WIRES: [&[(i32, i32)]; 3] = [
    &[(60, 105), (60, 40), (130, 40)],
    &[(230, 40), (300, 40), (300, 80)],
    &[(300, 160), (300, 200), (60, 200), (60, 135)],
];

const R1_ZIGZAG: [(i32, i32); 8] = [
    (130, 40),
    (140, 28),
    (155, 52),
    (170, 28),
    (185, 52),
    (200, 28),
    (215, 52),
    (230, 40),
];

const R2_ZIGZAG: [(i32, i32); 8] = [
    (300, 80),
    (312, 90),
    (288, 102),
    (312, 114),
    (288, 126),
    (312, 138),
    (288, 150),
    (300, 160),
];

fn points_attr(points: &[(i32, i32)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{},{}", x, y))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============ SVG ============

pub fn render_svg(v: f64, r1: f64, r2: f64) -> String {
    let mut shapes = String::new();
    for wire in WIRES.iter().copied().chain([&R1_ZIGZAG[..], &R2_ZIGZAG[..]]) {
        shapes.push_str(&format!("<polyline points=\"{}\"/>\n", points_attr(wire)));
    }

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<rect width="{w}" height="{h}" fill="#ffffff"/>
<g stroke="#111827" stroke-width="2" fill="none">
{shapes}<line x1="40" y1="105" x2="80" y2="105"/>
<line x1="50" y1="135" x2="70" y2="135" stroke-width="4"/>
</g>
<g font-family="sans-serif" font-size="14" fill="#111827">
<text x="90" y="125">{v} V</text>
<text x="44" y="96">+</text>
<text x="130" y="76">R1 = {r1} Ω</text>
<text x="180" y="125">R2 = {r2} Ω</text>
</g>
</svg>
"##,
        w = WIDTH,
        h = HEIGHT,
        shapes = shapes,
        v = v,
        r1 = ohms_label(r1),
        r2 = ohms_label(r2),
    )
}

// ============ PNG ============

pub fn render_png(v: f64, r1: f64, r2: f64) -> Result<Vec<u8>> {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, PAPER);

    for wire in WIRES {
        draw_polyline(&mut img, wire, 2);
    }
    draw_polyline(&mut img, &R1_ZIGZAG, 2);
    draw_polyline(&mut img, &R2_ZIGZAG, 2);

    // Source: long plate positive, short thick plate negative.
    draw_line(&mut img, (40, 105), (80, 105), 2);
    draw_line(&mut img, (50, 135), (70, 135), 4);

    draw_text(&mut img, "+", (44, 82), 2);
    draw_text(&mut img, &format!("{} V", v), (90, 112), 2);
    draw_text(&mut img, &format!("R1 = {} Ω", ohms_label(r1)), (130, 62), 2);
    draw_text(&mut img, &format!("R2 = {} Ω", ohms_label(r2)), (150, 112), 2);

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::Render(e.to_string()))?;
    Ok(bytes)
}

fn plot(img: &mut RgbImage, x: i32, y: i32) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, INK);
    }
}

fn stamp(img: &mut RgbImage, x: i32, y: i32, size: i32) {
    let half = size / 2;
    for dy in 0..size {
        for dx in 0..size {
            plot(img, x - half + dx, y - half + dy);
        }
    }
}

/// Bresenham line with a square pen of `thickness` pixels.
fn draw_line(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), thickness: i32) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(img, x, y, thickness);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_polyline(img: &mut RgbImage, points: &[(i32, i32)], thickness: i32) {
    for pair in points.windows(2) {
        draw_line(img, pair[0], pair[1], thickness);
    }
}

/// 5×7 bitmap glyphs, one byte per row, bit 4 is the leftmost column.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        'k' => [0b10000, 0b10000, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        '=' => [0, 0, 0b11111, 0, 0b11111, 0, 0],
        '+' => [0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0],
        'Ω' => [0b01110, 0b10001, 0b10001, 0b10001, 0b01010, 0b01010, 0b11011],
        _ => return None,
    };
    Some(rows)
}

/// Draws `text` with its top-left corner at `origin`. Unknown characters
/// advance like a space.
fn draw_text(img: &mut RgbImage, text: &str, origin: (i32, i32), scale: i32) {
    let (mut x, y) = origin;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (r, bits) in rows.iter().enumerate() {
                for c in 0..5 {
                    if (bits >> (4 - c)) & 1 == 1 {
                        for dy in 0..scale {
                            for dx in 0..scale {
                                plot(img, x + c * scale + dx, y + r as i32 * scale + dy);
                            }
                        }
                    }
                }
            }
        }
        x += 6 * scale;
    }
}
