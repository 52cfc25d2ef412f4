pub mod annotate;
pub mod classifier;
pub mod contours;
pub mod contrast;
pub mod preprocessing;
pub mod segments;
pub mod steps;

use anyhow::{Result, anyhow};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::detection::classifier::DigitClassifier;
use crate::detection::contrast::ClaheParams;
use crate::detection::preprocessing::BinarizeParams;
use crate::detection::steps::*;
use crate::models::{CapturedImage, DigitCandidate, Roi};
use crate::pipeline::{self, Pipeline};
use crate::sink::OutputSink;

/// Tunables of the display reading pipeline
#[derive(Debug, Clone, Copy)]
pub struct MeterReaderConfig {
    pub roi: Roi,
    pub clahe: ClaheParams,
    pub binarize: BinarizeParams,
    /// Candidates must enclose more than this many square pixels
    pub min_area: f32,
    /// ...and fewer than this many
    pub max_area: f32,
}

impl Default for MeterReaderConfig {
    fn default() -> Self {
        Self {
            roi: Roi::default(),
            clahe: ClaheParams::default(),
            binarize: BinarizeParams::default(),
            min_area: 50.0,
            max_area: 2000.0,
        }
    }
}

impl MeterReaderConfig {
    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = roi;
        self
    }
}

/// Everything the pipeline derived from one photo
pub struct MeterAnalysis {
    pub roi_image: RgbImage,
    pub enhanced: RgbImage,
    pub mask: GrayImage,
    pub candidates: Vec<DigitCandidate>,
    pub reading: String,
}

/// Reads a meter display: crop, enhance, binarize, find digits, classify
pub struct MeterReader {
    pub config: MeterReaderConfig,
    classifier: Box<dyn DigitClassifier>,
    debug: Option<(PathBuf, Arc<dyn OutputSink>)>,
}

impl MeterReader {
    pub fn new(config: MeterReaderConfig, classifier: Box<dyn DigitClassifier>) -> Self {
        Self {
            config,
            classifier,
            debug: None,
        }
    }

    /// Dump every stage image below `output_dir`
    pub fn with_debug(mut self, output_dir: impl Into<PathBuf>, sink: Arc<dyn OutputSink>) -> Self {
        self.debug = Some((output_dir.into(), sink));
        self
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Image stages from the full frame to the binary mask
    pub fn build_pipeline(&self) -> Pipeline {
        let mut pipeline = Pipeline::new()
            .add_step(Arc::new(RegionExtractionStep { roi: self.config.roi }))
            .add_step(Arc::new(ContrastEnhancementStep {
                params: self.config.clahe,
            }))
            .add_step(Arc::new(GrayscaleStep))
            .add_step(Arc::new(BlurStep {
                sigma: self.config.binarize.blur_sigma,
            }))
            .add_step(Arc::new(NormalizeStep))
            .add_step(Arc::new(ThresholdStep {
                threshold: self.config.binarize.threshold,
            }));

        if let Some((dir, sink)) = &self.debug {
            pipeline = pipeline.with_debug(dir.clone(), sink.clone());
        }
        pipeline
    }

    /// Run the pipeline and the classifier on a decoded photo. Writes nothing
    /// unless debug output is enabled.
    pub fn analyze(&self, image: &DynamicImage, label: &str) -> Result<MeterAnalysis> {
        let trace = self.build_pipeline().run(image.clone(), label)?;

        let roi_image = trace
            .stage(REGION_EXTRACTION)
            .ok_or_else(|| anyhow!("pipeline has no {} stage", REGION_EXTRACTION))?
            .to_rgb8();
        let enhanced = trace
            .stage(CONTRAST_ENHANCEMENT)
            .ok_or_else(|| anyhow!("pipeline has no {} stage", CONTRAST_ENHANCEMENT))?
            .to_rgb8();
        let mask = trace.output().to_luma8();

        let scan =
            contours::scan_digit_candidates(&mask, self.config.min_area, self.config.max_area);
        debug!(
            "Found {} digit candidates ({} too small, {} too large)",
            scan.candidates.len(),
            scan.rejected_small,
            scan.rejected_large
        );
        if scan.rejected_large > 0 {
            warn!(
                "Ignored {} bright regions larger than {} px² in {}; a digit may be missing",
                scan.rejected_large, self.config.max_area, label
            );
        }
        let candidates = scan.candidates;

        let reading = self.classifier.read(&mask, &candidates)?;

        Ok(MeterAnalysis {
            roi_image,
            enhanced,
            mask,
            candidates,
            reading,
        })
    }

    /// Analyze a captured photo and write the annotated images next to it
    pub fn process(&self, captured: &CapturedImage, sink: &dyn OutputSink) -> Result<String> {
        let label = pipeline::debug_label(&captured.path);
        let analysis = self.analyze(&captured.image, &label)?;

        let annotations = annotate::annotate(
            &captured.image,
            &self.config.roi,
            &analysis.roi_image,
            &analysis.candidates,
            &analysis.reading,
        );
        annotate::write_annotations(sink, &captured.path, &annotations)?;

        info!("Reading from {}: {}", captured.path.display(), analysis.reading);
        Ok(analysis.reading)
    }
}
