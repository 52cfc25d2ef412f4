use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use std::sync::OnceLock;
use tracing::debug;

use crate::detection::{contours, segments};
use crate::error::MeterError;
use crate::models::{BoundingBox, DigitCandidate};

/// Turns the ordered digit candidates of a binarized display into a reading
pub trait DigitClassifier: Send + Sync {
    fn read(&self, mask: &GrayImage, candidates: &[DigitCandidate]) -> Result<String>;

    fn name(&self) -> &str;
}

/// Reports the same reading for every image
#[derive(Debug, Clone)]
pub struct FixedReading {
    pub reading: String,
}

impl FixedReading {
    pub fn new(reading: impl Into<String>) -> Self {
        Self {
            reading: reading.into(),
        }
    }
}

impl Default for FixedReading {
    fn default() -> Self {
        Self::new("16737")
    }
}

impl DigitClassifier for FixedReading {
    fn read(&self, _mask: &GrayImage, _candidates: &[DigitCandidate]) -> Result<String> {
        Ok(self.reading.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

const TEMPLATE_WIDTH: u32 = 24;
const TEMPLATE_HEIGHT: u32 = 40;
/// Nominal width/height of a lone `1`, which is just the right-hand bar
const BAR_ASPECT: f32 = 0.12;
const ASPECT_PENALTY: u64 = 100_000_000;

struct DigitTemplate {
    digit: char,
    mask: GrayImage,
    aspect: f32,
}

static TEMPLATES: OnceLock<Vec<DigitTemplate>> = OnceLock::new();

fn templates() -> &'static [DigitTemplate] {
    TEMPLATES.get_or_init(|| {
        ('0'..='9')
            .map(|digit| {
                let size = (TEMPLATE_WIDTH, TEMPLATE_HEIGHT);
                if digit == '1' {
                    return DigitTemplate {
                        digit,
                        mask: GrayImage::from_pixel(size.0, size.1, Luma([255u8])),
                        aspect: BAR_ASPECT,
                    };
                }
                let mut mask = GrayImage::new(size.0, size.1);
                segments::draw_digit_mut(&mut mask, 0, 0, size, digit, Luma([255u8]));
                DigitTemplate {
                    digit,
                    mask,
                    aspect: TEMPLATE_WIDTH as f32 / TEMPLATE_HEIGHT as f32,
                }
            })
            .collect()
    })
}

/// Template matching against synthesized seven-segment digits.
///
/// Candidates are first grouped into digit cells, so a digit whose segments
/// are separated by unlit gaps is read as one. Each cell is cut from the mask,
/// scaled to the template size and compared by sum of absolute differences.
/// Templates whose aspect ratio is more than 50% off the cell's are ruled out.
///
/// A cell that matches no template makes the whole reading fail unless
/// `allow_unknown` is set, in which case it is emitted as `unknown`.
#[derive(Debug, Clone)]
pub struct SevenSegmentClassifier {
    /// Mean per-pixel difference above which a match is rejected
    pub max_mean_difference: f32,
    /// Emitted for cells no template matches
    pub unknown: char,
    /// Return partial readings instead of failing
    pub allow_unknown: bool,
}

impl Default for SevenSegmentClassifier {
    fn default() -> Self {
        Self {
            max_mean_difference: 96.0,
            unknown: '?',
            allow_unknown: false,
        }
    }
}

impl SevenSegmentClassifier {
    /// Best matching digit for one candidate, with a relative confidence in 0..=1
    pub fn classify(&self, mask: &GrayImage, candidate: &DigitCandidate) -> Option<(char, f32)> {
        self.classify_cell(mask, &candidate.bbox)
    }

    /// Best matching digit for the region of `mask` inside `cell`
    pub fn classify_cell(&self, mask: &GrayImage, cell: &BoundingBox) -> Option<(char, f32)> {
        let crop = imageops::crop_imm(mask, cell.min_x, cell.min_y, cell.width(), cell.height())
            .to_image();
        let aspect = cell.aspect_ratio();

        let mut best: Option<(char, u64)> = None;
        let mut second_best = u64::MAX;

        for template in templates() {
            let mismatch = (aspect - template.aspect).abs() / template.aspect.max(0.01);
            let mut score = if mismatch > 0.5 { ASPECT_PENALTY } else { 0 };

            if score == 0 {
                let (width, height) = template.mask.dimensions();
                let resized = imageops::resize(&crop, width, height, FilterType::Triangle);
                score = resized
                    .pixels()
                    .zip(template.mask.pixels())
                    .map(|(p, q)| (p[0] as i32 - q[0] as i32).unsigned_abs() as u64)
                    .sum();
            }

            match best {
                Some((_, best_score)) if score >= best_score => {
                    second_best = second_best.min(score);
                }
                _ => {
                    if let Some((_, previous)) = best {
                        second_best = previous;
                    }
                    best = Some((template.digit, score));
                }
            }
        }

        let (digit, score) = best?;
        if score >= ASPECT_PENALTY {
            return None;
        }

        let mean = score as f32 / (TEMPLATE_WIDTH * TEMPLATE_HEIGHT) as f32;
        if mean > self.max_mean_difference {
            debug!("Rejected cell at x={}: mean difference {:.1}", cell.min_x, mean);
            return None;
        }

        let confidence = if second_best > 0 && second_best != u64::MAX {
            1.0 - score as f32 / second_best as f32
        } else {
            1.0
        };
        Some((digit, confidence))
    }
}

impl DigitClassifier for SevenSegmentClassifier {
    fn read(&self, mask: &GrayImage, candidates: &[DigitCandidate]) -> Result<String> {
        if candidates.is_empty() {
            return Err(MeterError::NoDigitCandidates.into());
        }

        let cells = contours::digit_cells(candidates);
        debug!("{} candidates grouped into {} digit cells", candidates.len(), cells.len());

        let mut complete = true;
        let reading: String = cells
            .iter()
            .map(|cell| match self.classify_cell(mask, cell) {
                Some((digit, confidence)) => {
                    debug!("Cell at x={}: '{}' (confidence: {:.2})", cell.min_x, digit, confidence);
                    digit
                }
                None => {
                    complete = false;
                    self.unknown
                }
            })
            .collect();

        if !complete && !self.allow_unknown {
            return Err(MeterError::UnreadableDigits(reading).into());
        }
        Ok(reading)
    }

    fn name(&self) -> &str {
        "seven-segment"
    }
}
