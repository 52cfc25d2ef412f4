use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::error::MeterError;
use crate::models::Roi;

/// Parameters of the grayscale → blur → normalize → threshold chain
#[derive(Debug, Clone, Copy)]
pub struct BinarizeParams {
    /// Gaussian sigma; 1.1 is what a 5x5 kernel implies
    pub blur_sigma: f32,
    /// Pixels strictly brighter than this become 255, the rest 0
    pub threshold: u8,
}

impl Default for BinarizeParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            threshold: 160,
        }
    }
}

/// Cut the ROI out of the full frame
pub fn extract_region(img: &DynamicImage, roi: &Roi) -> Result<DynamicImage, MeterError> {
    if !roi.fits_within(img.width(), img.height()) {
        return Err(MeterError::RoiOutOfBounds {
            roi: *roi,
            image_width: img.width(),
            image_height: img.height(),
        });
    }
    Ok(img.crop_imm(roi.x, roi.y, roi.width, roi.height))
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Stretch the darkest pixel to 0 and the brightest to 255.
/// A flat image has no range to stretch and maps to all zeros.
pub fn normalize(img: &GrayImage) -> GrayImage {
    let (lo, hi) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if hi <= lo {
        return GrayImage::new(img.width(), img.height());
    }

    let scale = 255.0 / (hi - lo) as f32;
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = (img.get_pixel(x, y)[0] - lo) as f32 * scale;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Binary threshold: `> threshold` → 255, else 0
pub fn threshold(img: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Full binarization of an enhanced display region
pub fn binarize(img: &RgbImage, params: &BinarizeParams) -> GrayImage {
    let gray = to_grayscale(&DynamicImage::ImageRgb8(img.clone()));
    let blurred = apply_blur(&gray, params.blur_sigma);
    let normalized = normalize(&blurred);
    threshold(&normalized, params.threshold)
}
