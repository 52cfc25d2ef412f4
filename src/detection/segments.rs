//! Seven-segment glyph geometry
//!
//! Segments are named `a`..`g` clockwise from the top with `g` in the middle,
//! and stored as bits 0..6 of a digit's pattern.

use imageproc::drawing::{Canvas, draw_filled_rect_mut};
use imageproc::rect::Rect;

/// Lit segments for the digits 0-9
pub const DIGIT_PATTERNS: [u8; 10] = [
    0b011_1111, // 0
    0b000_0110, // 1
    0b101_1011, // 2
    0b100_1111, // 3
    0b110_0110, // 4
    0b110_1101, // 5
    0b111_1101, // 6
    0b000_0111, // 7
    0b111_1111, // 8
    0b110_1111, // 9
];

/// Lit segments for a character: the digits, `-` (middle bar) and `?`
/// (top, upper right, middle and lower left, the usual LCD question mark)
pub fn glyph_pattern(ch: char) -> Option<u8> {
    match ch {
        '0'..='9' => ch.to_digit(10).map(|d| DIGIT_PATTERNS[d as usize]),
        '-' => Some(0b100_0000),
        '?' => Some(0b101_0011),
        _ => None,
    }
}

/// Stroke width for a glyph of the given width
pub fn stroke_for_width(width: u32) -> u32 {
    ((width as f32 * 0.22).round() as u32).max(1)
}

/// Rectangles of the seven segments of a `width` x `height` cell at the
/// origin. Neighbouring segments overlap at the joints, so a lit glyph is a
/// single connected shape.
pub fn segment_rects(width: u32, height: u32, stroke: u32) -> [Rect; 7] {
    let w = width.max(stroke);
    let h = height.max(2 * stroke);
    let s = stroke;
    let mid = (h / 2).saturating_sub(s / 2) as i32;
    let upper_h = mid as u32 + s;
    let lower_h = h - mid as u32;
    let right = (w - s) as i32;

    [
        Rect::at(0, 0).of_size(w, s),                    // a
        Rect::at(right, 0).of_size(s, upper_h),          // b
        Rect::at(right, mid).of_size(s, lower_h),        // c
        Rect::at(0, (h - s) as i32).of_size(w, s),       // d
        Rect::at(0, mid).of_size(s, lower_h),            // e
        Rect::at(0, 0).of_size(s, upper_h),              // f
        Rect::at(0, mid).of_size(w, s),                  // g
    ]
}

/// Draw one glyph with its top-left corner at `(x, y)`.
/// Returns false (and draws nothing) for characters without a glyph.
pub fn draw_digit_mut<C: Canvas>(
    canvas: &mut C,
    x: i32,
    y: i32,
    size: (u32, u32),
    glyph: char,
    color: C::Pixel,
) -> bool {
    let Some(pattern) = glyph_pattern(glyph) else {
        return false;
    };
    let stroke = stroke_for_width(size.0);

    for (bit, rect) in segment_rects(size.0, size.1, stroke).into_iter().enumerate() {
        if pattern & (1 << bit) != 0 {
            let placed =
                Rect::at(rect.left() + x, rect.top() + y).of_size(rect.width(), rect.height());
            draw_filled_rect_mut(canvas, placed, color);
        }
    }
    true
}

/// Draw a string of digits left to right with `gap` pixels between glyphs.
/// Characters without a glyph leave an empty cell. Returns the total width.
pub fn draw_digits_mut<C: Canvas>(
    canvas: &mut C,
    x: i32,
    y: i32,
    size: (u32, u32),
    gap: u32,
    text: &str,
    color: C::Pixel,
) -> u32 {
    let advance = size.0 + gap;
    let mut cursor = x;
    for ch in text.chars() {
        draw_digit_mut(canvas, cursor, y, size, ch, color);
        cursor += advance as i32;
    }
    (cursor - x) as u32
}
