//! Burns detection boxes and labels into a frame.
//!
//! Pure transform: input frame plus detections in, freshly rendered frame
//! out. An empty detection batch returns the pixels untouched.

use anyhow::{Result, anyhow};
use detect_core::{DetectionBatch, labels::class_name};
use image::{ImageBuffer, Rgb};
use video_io::Frame;

// Pixels are BGR throughout; the `Rgb` container is only used as a
// width/height-indexed byte buffer, so colour constants are written in BGR.
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

type Canvas = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Render `detections` onto a copy of `frame`.
pub(crate) fn annotate(frame: &Frame, detections: &DetectionBatch) -> Result<Frame> {
    if detections.is_empty() {
        return Ok(Frame {
            data: frame.data.clone(),
            width: frame.width,
            height: frame.height,
            timestamp_ms: frame.timestamp_ms,
            format: frame.format,
        });
    }

    let width = frame.width as u32;
    let height = frame.height as u32;
    let mut canvas = Canvas::from_vec(width, height, frame.data.clone())
        .ok_or_else(|| anyhow!("failed to convert frame into image buffer"))?;

    for detection in &detections.detections {
        let left = detection.bbox[0].round() as i32;
        let top = detection.bbox[1].round() as i32;
        let right = detection.bbox[2].round() as i32;
        let bottom = detection.bbox[3].round() as i32;
        draw_rectangle(&mut canvas, left, top, right, bottom, BOX_COLOR);
    }

    for detection in &detections.detections {
        let left = detection.bbox[0].round() as i32;
        let top = detection.bbox[1].round() as i32;
        let label = format!(
            "{} {:.0}%",
            class_name(detection.class_id),
            detection.score * 100.0
        );
        let label_x = left;
        let label_y = (top - 12).max(0);
        let text_width = label.chars().count() as i32 * 6;
        fill_rect(
            &mut canvas,
            label_x,
            label_y,
            label_x + text_width,
            label_y + 8,
            LABEL_BACKGROUND,
        );
        draw_label(&mut canvas, label_x, label_y, &label, LABEL_TEXT_COLOR);
    }

    Ok(Frame {
        data: canvas.into_raw(),
        width: frame.width,
        height: frame.height,
        timestamp_ms: frame.timestamp_ms,
        format: frame.format,
    })
}

fn draw_rectangle(canvas: &mut Canvas, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for x in left..=right {
        *canvas.get_pixel_mut(x as u32, top as u32) = color;
        *canvas.get_pixel_mut(x as u32, bottom as u32) = color;
    }
    for y in top..=bottom {
        *canvas.get_pixel_mut(left as u32, y as u32) = color;
        *canvas.get_pixel_mut(right as u32, y as u32) = color;
    }
}

fn fill_rect(canvas: &mut Canvas, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for y in top..=bottom {
        for x in left..=right {
            *canvas.get_pixel_mut(x as u32, y as u32) = color;
        }
    }
}

fn draw_label(canvas: &mut Canvas, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let px = x + col as i32;
                        if px >= 0 && px < width {
                            *canvas.get_pixel_mut(px as u32, py as u32) = color;
                        }
                    }
                }
            }
        }
        x += 6;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'B' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'D' => Some([
            0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'G' => Some([
            0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111,
        ]),
        'H' => Some([
            0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        'J' => Some([
            0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100,
        ]),
        'K' => Some([
            0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001,
        ]),
        'L' => Some([
            0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'M' => Some([
            0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001,
        ]),
        'N' => Some([
            0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'Q' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        'T' => Some([
            0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'U' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'V' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100,
        ]),
        'W' => Some([
            0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010,
        ]),
        'X' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001,
        ]),
        'Y' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'Z' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        '-' => Some([0, 0, 0, 0b01110, 0, 0, 0]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}
