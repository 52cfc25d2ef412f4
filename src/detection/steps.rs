use crate::pipeline::{PipelineData, PipelineStep, PipelineContext};
use crate::detection::contrast::{self, ClaheParams};
use crate::detection::preprocessing;
use crate::models::Roi;
use anyhow::Result;
use image::DynamicImage;

pub const REGION_EXTRACTION: &str = "Region Extraction";
pub const CONTRAST_ENHANCEMENT: &str = "Contrast Enhancement";

/// Crop the LCD region out of the full frame
pub struct RegionExtractionStep {
    pub roi: Roi,
}

impl PipelineStep for RegionExtractionStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let cropped = preprocessing::extract_region(&data.original, &self.roi)?;
        Ok(PipelineData {
            image: DynamicImage::ImageRgb8(cropped.to_rgb8()),
            original: data.original.clone(),
            region: Some(self.roi),
        })
    }

    fn name(&self) -> &str {
        REGION_EXTRACTION
    }
}

/// CLAHE on the lightness channel
pub struct ContrastEnhancementStep {
    pub params: ClaheParams,
}

impl PipelineStep for ContrastEnhancementStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let enhanced = contrast::enhance_contrast(&data.image.to_rgb8(), &self.params);
        Ok(data.with_image(DynamicImage::ImageRgb8(enhanced)))
    }

    fn name(&self) -> &str {
        CONTRAST_ENHANCEMENT
    }
}

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = preprocessing::to_grayscale(&data.image);
        Ok(data.with_image(DynamicImage::ImageLuma8(gray)))
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Apply Gaussian blur
pub struct BlurStep {
    pub sigma: f32,
}

impl PipelineStep for BlurStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = data.image.to_luma8();
        let blurred = preprocessing::apply_blur(&gray, self.sigma);
        Ok(data.with_image(DynamicImage::ImageLuma8(blurred)))
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Stretch intensities to the full 0-255 range
pub struct NormalizeStep;

impl PipelineStep for NormalizeStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let normalized = preprocessing::normalize(&data.image.to_luma8());
        Ok(data.with_image(DynamicImage::ImageLuma8(normalized)))
    }

    fn name(&self) -> &str {
        "Normalization"
    }
}

/// Split light digit segments from the dark background
pub struct ThresholdStep {
    pub threshold: u8,
}

impl PipelineStep for ThresholdStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let binary = preprocessing::threshold(&data.image.to_luma8(), self.threshold);
        Ok(data.with_image(DynamicImage::ImageLuma8(binary)))
    }

    fn name(&self) -> &str {
        "Threshold"
    }
}
