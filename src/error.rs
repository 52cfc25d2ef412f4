use std::path::PathBuf;

use thiserror::Error;

use crate::models::Roi;

#[derive(Debug, Error)]
pub enum MeterError {
    #[error("ROI must have exactly 4 values (x,y,width,height), got {0}")]
    RoiArity(usize),

    #[error("ROI must be four non-negative integers separated by commas: {0:?}")]
    RoiNotInteger(String),

    #[error("ROI width and height must be positive, got {width}x{height}")]
    RoiEmpty { width: u32, height: u32 },

    #[error("ROI {roi} is out of bounds for a {image_width}x{image_height} image")]
    RoiOutOfBounds {
        roi: Roi,
        image_width: u32,
        image_height: u32,
    },

    #[error("Image file not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Failed to download image. Status code: {status} ({url})")]
    HttpStatus { status: u16, url: String },

    #[error("No digit candidates found in the display region")]
    NoDigitCandidates,

    #[error("Some digits could not be recognized: {0:?}")]
    UnreadableDigits(String),
}
