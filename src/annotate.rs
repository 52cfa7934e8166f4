mod font;

pub use font::{FontTextRenderer, SYSTEM_FONT_CANDIDATES};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::prediction::{PixelBox, Prediction};
use crate::traits::TextRenderer;

pub const HITBOX_THICKNESS: i32 = 15;
pub const HITBOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Pixels the label text is pushed down inside its background.
pub const TEXT_NUDGE: i32 = 5;

/// Font parameters for a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Multiplier on the renderer's base glyph height.
    pub scale: f32,
    /// Stroke weight in pixels; renderers emulate it by overdrawing.
    pub thickness: u32,
    pub text_color: Rgb<u8>,
    pub background_color: Rgb<u8>,
}

impl TextStyle {
    /// White text on the hitbox color.
    pub const fn label() -> Self {
        Self {
            scale: 1.5,
            thickness: 2,
            text_color: Rgb([255, 255, 255]),
            background_color: HITBOX_COLOR,
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            scale: 3.0,
            thickness: 1,
            text_color: Rgb([255, 255, 255]),
            background_color: Rgb([0, 0, 0]),
        }
    }
}

/// Fills the inclusive rectangle spanned by two corners. Nothing is drawn for an
/// empty span.
fn fill_between(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let (x0, x1) = (from.0.min(to.0), from.0.max(to.0));
    let (y0, y1) = (from.1.min(to.1), from.1.max(to.1));
    let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
    draw_filled_rect_mut(image, rect, color);
}

/// Strokes the rectangle between `start` and `end` (both inclusive).
///
/// The stroke is centred on the rectangle's edges: a thickness of 15 covers 7
/// pixels on either side of each edge.
pub fn draw_hitbox(
    image: &mut RgbImage,
    start: (i32, i32),
    end: (i32, i32),
    thickness: i32,
    color: Rgb<u8>,
) {
    let (x0, x1) = (start.0.min(end.0), start.0.max(end.0));
    let (y0, y1) = (start.1.min(end.1), start.1.max(end.1));
    let half = thickness.max(1) / 2;

    for offset in -half..=half {
        let width = x1 - x0 + 1 + 2 * offset;
        let height = y1 - y0 + 1 + 2 * offset;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at(x0 - offset, y0 - offset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Draws `text` over a solid background and returns the background's
/// bottom-right corner, so further labels can be stacked below it.
///
/// The origin is moved up by the text height; the background then spans from
/// `(x - bg_offset_w, y - h - bg_offset_h)` to `(x + w, y + h)` and the text is
/// drawn `TEXT_NUDGE` pixels below the shifted origin.
pub fn draw_text<R: TextRenderer + ?Sized>(
    image: &mut RgbImage,
    renderer: &R,
    text: &str,
    style: &TextStyle,
    pos: (i32, i32),
    bg_offset_h: i32,
    bg_offset_w: i32,
) -> (i32, i32) {
    let (text_w, text_h) = renderer.text_size(text, style);
    let (text_w, text_h) = (text_w as i32, text_h as i32);

    let x = pos.0;
    let y = pos.1 - text_h;

    let bg_start = (x - bg_offset_w, y - bg_offset_h);
    let text_end = (x + text_w, y + text_h * 2);

    fill_between(image, bg_start, text_end, style.background_color);
    renderer.draw_text(image, text, style, x, y + TEXT_NUDGE);

    text_end
}

/// Draws one prediction's hitbox and label, returns the pixel box it used.
pub fn annotate_prediction<R: TextRenderer + ?Sized>(
    image: &mut RgbImage,
    renderer: &R,
    prediction: &Prediction,
) -> PixelBox {
    let pixel_box = prediction
        .bounding_box
        .to_pixel_box(image.width(), image.height());

    draw_hitbox(
        image,
        pixel_box.start(),
        pixel_box.end(),
        HITBOX_THICKNESS,
        HITBOX_COLOR,
    );
    draw_text(
        image,
        renderer,
        &prediction.label(),
        &TextStyle::label(),
        pixel_box.start(),
        HITBOX_THICKNESS,
        HITBOX_THICKNESS,
    );

    pixel_box
}
