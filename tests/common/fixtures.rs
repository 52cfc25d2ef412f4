use anyhow::anyhow;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{Canvas, draw_filled_rect_mut};
use imageproc::rect::Rect;
use lcd_meter::detection::classifier::FixedReading;
use lcd_meter::detection::segments;
use lcd_meter::{CapturedImage, ImageSource, MeterReader, MeterReaderConfig, Roi};
use std::path::PathBuf;
use time::macros::datetime;
use time::PrimitiveDateTime;

pub const BACKGROUND: Rgb<u8> = Rgb([40, 45, 40]);
pub const SEGMENT_ON: Rgb<u8> = Rgb([220, 230, 220]);
pub const GLYPH: (u32, u32) = (30, 50);
pub const GLYPH_GAP: u32 = 12;

/// ROI used with [`render_meter`]
pub fn test_roi() -> Roi {
    Roi::new(40, 40, 320, 80)
}

/// A 400x160 photo of a dark LCD showing `reading` in bright seven-segment
/// digits inside [`test_roi`]
pub fn render_meter(reading: &str) -> DynamicImage {
    let roi = test_roi();
    let mut img = RgbImage::from_pixel(400, 160, BACKGROUND);
    let top = roi.y + (roi.height - GLYPH.1) / 2;
    segments::draw_digits_mut(
        &mut img,
        roi.x as i32 + 10,
        top as i32,
        GLYPH,
        GLYPH_GAP,
        reading,
        SEGMENT_ON,
    );
    DynamicImage::ImageRgb8(img)
}

/// Binary mask with bright digits on black
pub fn render_digit_mask(reading: &str) -> GrayImage {
    let width = 20 + reading.len() as u32 * (GLYPH.0 + GLYPH_GAP);
    let mut mask = GrayImage::new(width, GLYPH.1 + 20);
    segments::draw_digits_mut(&mut mask, 10, 10, GLYPH, GLYPH_GAP, reading, Luma([255u8]));
    mask
}

/// Binary mask with filled rectangles `(x, y, width, height)`
pub fn rect_mask(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = rects
            .iter()
            .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
        if inside { Luma([255u8]) } else { Luma([0u8]) }
    })
}

pub const GAPPED_GLYPH: (u32, u32) = (40, 80);
/// Unlit pixels between neighbouring segments of a gapped glyph
pub const SEGMENT_GAP: u32 = 3;

/// ROI used with [`render_gapped_meter`]
pub fn gapped_roi() -> Roi {
    Roi::new(40, 40, 360, 120)
}

/// Draw digits the way most LCD panels show them: every segment is a
/// separate island with [`SEGMENT_GAP`] unlit pixels around it
pub fn draw_gapped_digits<C: Canvas>(canvas: &mut C, x: i32, y: i32, text: &str, color: C::Pixel) {
    let (w, h) = GAPPED_GLYPH;
    let s = segments::stroke_for_width(w);
    let gap = SEGMENT_GAP;
    let mid = h / 2 - s / 2;
    let (upper_y, upper_h) = (s + gap, mid - gap - (s + gap));
    let (lower_y, lower_h) = (mid + s + gap, h - s - gap - (mid + s + gap));
    let bar = w - 2 * gap;

    // a, b, c, d, e, f, g as (x, y, width, height)
    let rects = [
        (gap, 0, bar, s),
        (w - s, upper_y, s, upper_h),
        (w - s, lower_y, s, lower_h),
        (gap, h - s, bar, s),
        (0, lower_y, s, lower_h),
        (0, upper_y, s, upper_h),
        (gap, mid, bar, s),
    ];

    for (i, ch) in text.chars().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            continue;
        };
        let left = x + (i as u32 * (w + GLYPH_GAP)) as i32;
        let pattern = segments::DIGIT_PATTERNS[digit as usize];
        for (bit, &(rx, ry, rw, rh)) in rects.iter().enumerate() {
            if pattern & (1 << bit) != 0 {
                let rect = Rect::at(left + rx as i32, y + ry as i32).of_size(rw, rh);
                draw_filled_rect_mut(canvas, rect, color);
            }
        }
    }
}

/// A 480x200 photo of an LCD with gapped segments inside [`gapped_roi`]
pub fn render_gapped_meter(reading: &str) -> DynamicImage {
    let roi = gapped_roi();
    let mut img = RgbImage::from_pixel(480, 200, BACKGROUND);
    draw_gapped_digits(&mut img, roi.x as i32 + 10, roi.y as i32 + 20, reading, SEGMENT_ON);
    DynamicImage::ImageRgb8(img)
}

/// Binary mask with gapped bright digits on black
pub fn render_gapped_digit_mask(reading: &str) -> GrayImage {
    let width = 20 + reading.len() as u32 * (GAPPED_GLYPH.0 + GLYPH_GAP);
    let mut mask = GrayImage::new(width, GAPPED_GLYPH.1 + 20);
    draw_gapped_digits(&mut mask, 10, 10, reading, Luma([255u8]));
    mask
}

/// Reader for [`test_roi`] that always reports "16737"
pub fn fixed_reader() -> MeterReader {
    MeterReader::new(
        MeterReaderConfig::default().with_roi(test_roi()),
        Box::new(FixedReading::default()),
    )
}

pub fn fixed_time(second: u8) -> PrimitiveDateTime {
    datetime!(2024-03-01 12:00:00).replace_second(second).expect("valid second")
}

/// Serves rendered meter photos and fails on chosen attempts (1-based)
pub struct FlakySource {
    pub dir: PathBuf,
    pub fail_on: Vec<u32>,
    pub attempts: u32,
}

impl FlakySource {
    pub fn new(dir: impl Into<PathBuf>, fail_on: Vec<u32>) -> Self {
        Self {
            dir: dir.into(),
            fail_on,
            attempts: 0,
        }
    }
}

impl ImageSource for FlakySource {
    fn acquire(&mut self) -> anyhow::Result<CapturedImage> {
        self.attempts += 1;
        if self.fail_on.contains(&self.attempts) {
            return Err(anyhow!("camera unreachable on attempt {}", self.attempts));
        }
        Ok(CapturedImage {
            image: render_meter("16737"),
            path: self.dir.join(format!("meter_{}.jpg", self.attempts)),
        })
    }
}
