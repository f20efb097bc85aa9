use crate::config::KeypointLayout;
use crate::models::{DetectedObject, Frame, ScaleReading};
use crate::scale::ScaleCalculator;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const POINTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 128, 255]);
const LABEL_BG: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_FG: Rgb<u8> = Rgb([255, 255, 255]);

/// 3x5 bitmap glyphs, one row per byte (low 3 bits, MSB on the left)
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        ' ' => [0; 5],
        _ => return None,
    })
}

/// Draws detections and readings over a copy of the frame
#[derive(Debug, Clone)]
pub struct ResultRenderer {
    pub calculator: ScaleCalculator,
    pub layout: KeypointLayout,
    pub line_thickness: u32,
}

impl ResultRenderer {
    pub fn new(calculator: ScaleCalculator, layout: KeypointLayout) -> Self {
        Self {
            calculator,
            layout,
            line_thickness: 2,
        }
    }

    /// Render every object's box; objects with a reading also get their
    /// keypoints and a value label.
    pub fn render(&self, frame: &Frame, objects: &[DetectedObject], readings: &[ScaleReading]) -> RgbImage {
        let mut canvas = frame.image().clone();
        let pixel = label_pixel_size(canvas.width(), canvas.height());

        for (index, object) in objects.iter().enumerate() {
            let Some(rect) = to_rect(object, canvas.width(), canvas.height()) else {
                continue;
            };
            for t in 0..self.line_thickness {
                if let Some(inner) = shrink(rect, t) {
                    draw_hollow_rect_mut(&mut canvas, inner, BOX_COLOR);
                }
            }

            let Some(reading) = readings.iter().find(|r| r.object_index == index) else {
                continue;
            };
            self.draw_keypoints(&mut canvas, reading);

            let text = self.calculator.format_value(reading.value);
            let label_y = rect.top() - (7 * pixel) as i32;
            draw_label(&mut canvas, &text, rect.left(), label_y.max(0), pixel);
        }

        canvas
    }

    fn draw_keypoints(&self, canvas: &mut RgbImage, reading: &ScaleReading) {
        let (ox, oy) = (reading.origin.0 as f32, reading.origin.1 as f32);
        let points = reading.keypoints.translated(ox, oy);
        let radius = ((canvas.width().min(canvas.height()) / 200).max(2)) as i32;

        if let (Some(pivot), Some(tip)) = (points.get(self.layout.pivot), points.get(self.layout.tip)) {
            draw_line_segment_mut(canvas, (pivot.x, pivot.y), (tip.x, tip.y), POINTER_COLOR);
        }
        for p in &points.points {
            draw_filled_circle_mut(canvas, (p.x.round() as i32, p.y.round() as i32), radius, KEYPOINT_COLOR);
        }
    }
}

/// Size of one glyph pixel, so labels stay legible on large photos
fn label_pixel_size(width: u32, height: u32) -> u32 {
    (width.max(height) / 300).max(2)
}

fn to_rect(object: &DetectedObject, width: u32, height: u32) -> Option<Rect> {
    let b = &object.bbox;
    if !b.is_finite() {
        return None;
    }
    let x1 = b.x.max(0.0).round() as i32;
    let y1 = b.y.max(0.0).round() as i32;
    let x2 = b.right().min(width as f32).round() as i32;
    let y2 = b.bottom().min(height as f32).round() as i32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

fn shrink(rect: Rect, by: u32) -> Option<Rect> {
    let (w, h) = (rect.width(), rect.height());
    if w <= 2 * by || h <= 2 * by {
        return None;
    }
    Some(Rect::at(rect.left() + by as i32, rect.top() + by as i32).of_size(w - 2 * by, h - 2 * by))
}

/// Draw `text` with the built-in font on a filled background
fn draw_label(canvas: &mut RgbImage, text: &str, x: i32, y: i32, pixel: u32) {
    let glyphs: Vec<[u8; 5]> = text.chars().filter_map(glyph).collect();
    if glyphs.is_empty() {
        return;
    }

    let advance = 4 * pixel;
    let width = glyphs.len() as u32 * advance + pixel;
    let height = 7 * pixel;
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(width, height), LABEL_BG);

    for (i, rows) in glyphs.iter().enumerate() {
        let gx = x + (pixel + i as u32 * advance) as i32;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let px = gx + (col * pixel) as i32;
                let py = y + ((row as u32 + 1) * pixel) as i32;
                draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(pixel, pixel), LABEL_FG);
            }
        }
    }
}
