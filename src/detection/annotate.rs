use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::detection::segments;
use crate::models::{DigitCandidate, Roi};
use crate::sink::{self, OutputSink};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const CAPTION_GLYPH: (u32, u32) = (12, 20);
const CAPTION_GAP: u32 = 4;
/// Distance between the caption baseline and the top of the ROI box
const CAPTION_MARGIN: i32 = 10;

/// Annotated renderings of one processed image
pub struct Annotations {
    /// Full frame with the ROI outlined and the reading above it
    pub result: RgbImage,
    /// Cropped display region with the digit candidates outlined
    pub roi: RgbImage,
}

/// Draw the ROI box, the caption and the candidate outlines.
///
/// The caption is the reading alone, drawn as seven-segment glyphs since no
/// font is available; there is no "Reading:" prefix or unit. Unrecognized
/// digits show as the `?` glyph.
pub fn annotate(
    original: &DynamicImage,
    roi: &Roi,
    roi_image: &RgbImage,
    candidates: &[DigitCandidate],
    reading: &str,
) -> Annotations {
    let mut result = original.to_rgb8();
    draw_box(&mut result, roi);
    let caption_top = roi.y as i32 - CAPTION_MARGIN - CAPTION_GLYPH.1 as i32;
    segments::draw_digits_mut(
        &mut result,
        roi.x as i32,
        caption_top,
        CAPTION_GLYPH,
        CAPTION_GAP,
        reading,
        GREEN,
    );

    let mut outlined = roi_image.clone();
    for candidate in candidates {
        draw_outline(&mut outlined, candidate);
    }

    Annotations {
        result,
        roi: outlined,
    }
}

/// 2px rectangle just inside the ROI edges
fn draw_box(canvas: &mut RgbImage, roi: &Roi) {
    draw_hollow_rect_mut(
        canvas,
        Rect::at(roi.x as i32, roi.y as i32).of_size(roi.width, roi.height),
        GREEN,
    );
    if roi.width > 2 && roi.height > 2 {
        draw_hollow_rect_mut(
            canvas,
            Rect::at(roi.x as i32 + 1, roi.y as i32 + 1).of_size(roi.width - 2, roi.height - 2),
            GREEN,
        );
    }
}

fn draw_outline(canvas: &mut RgbImage, candidate: &DigitCandidate) {
    let points = &candidate.points;
    for (p, q) in points.iter().zip(points.iter().cycle().skip(1)) {
        draw_line_segment_mut(
            canvas,
            (p.x as f32, p.y as f32),
            (q.x as f32, q.y as f32),
            GREEN,
        );
    }
}

/// `<dir>/<stem>_result.jpg` and `<dir>/<stem>_roi.jpg` next to the input
pub fn output_paths(image_path: &Path) -> (PathBuf, PathBuf) {
    let dir = image_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    (
        dir.join(format!("{}_result.jpg", stem)),
        dir.join(format!("{}_roi.jpg", stem)),
    )
}

/// Write both annotated images as JPEG next to `image_path`
pub fn write_annotations(
    sink: &dyn OutputSink,
    image_path: &Path,
    annotations: &Annotations,
) -> Result<(PathBuf, PathBuf)> {
    let (result_path, roi_path) = output_paths(image_path);

    sink::save_image(
        sink,
        &result_path,
        &DynamicImage::ImageRgb8(annotations.result.clone()),
        ImageFormat::Jpeg,
    )?;
    info!("Processed image saved: {}", result_path.display());

    sink::save_image(
        sink,
        &roi_path,
        &DynamicImage::ImageRgb8(annotations.roi.clone()),
        ImageFormat::Jpeg,
    )?;
    info!("ROI with contours saved: {}", roi_path.display());

    Ok((result_path, roi_path))
}
