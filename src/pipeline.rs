use anyhow::Result;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::models::Roi;
use crate::sink::{self, OutputSink};

/// Data that flows through the pipeline
#[derive(Clone)]
pub struct PipelineData {
    /// The image data (color, grayscale or binary mask)
    pub image: DynamicImage,

    /// Reference to the full frame (shared via Arc)
    pub original: Arc<DynamicImage>,

    /// Region of the full frame this image was cut from (None means full image)
    pub region: Option<Roi>,
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            region: None,
        }
    }

    /// Same provenance, new pixels
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            original: self.original.clone(),
            region: self.region,
        }
    }
}

/// Where intermediate stage images are written in debug mode
#[derive(Clone)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    pub sink: Arc<dyn OutputSink>,
}

impl DebugConfig {
    fn save(&self, label: &str, file_name: &str, image: &DynamicImage) -> Result<()> {
        let dir = self.output_dir.join(label);
        self.sink.create_dir_all(&dir)?;
        let path = dir.join(file_name);
        // Float or 16-bit stages are not PNG-encodable as-is
        let image = DynamicImage::ImageRgb8(image.to_rgb8());
        sink::save_image(self.sink.as_ref(), &path, &image, ImageFormat::Png)?;
        debug!("Debug: saved {}", path.display());
        Ok(())
    }
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Transform one image into the next stage
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable name for this step (used in logs and debug file names)
    fn name(&self) -> &str;
}

/// Output of every stage of one pipeline run, in execution order
pub struct PipelineTrace {
    pub input: Arc<DynamicImage>,
    pub stages: Vec<(String, PipelineData)>,
}

impl PipelineTrace {
    /// Output of the last stage, or the input when the pipeline is empty
    pub fn output(&self) -> &DynamicImage {
        self.stages
            .last()
            .map(|(_, data)| &data.image)
            .unwrap_or(self.input.as_ref())
    }

    /// Output of the named stage
    pub fn stage(&self, name: &str) -> Option<&DynamicImage> {
        self.stages
            .iter()
            .find(|(stage_name, _)| stage_name == name)
            .map(|(_, data)| &data.image)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode; stage images are written below `output_dir`
    pub fn with_debug(mut self, output_dir: impl Into<PathBuf>, sink: Arc<dyn OutputSink>) -> Self {
        self.context.debug = Some(DebugConfig {
            output_dir: output_dir.into(),
            sink,
        });
        self
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order. `label` names the debug subdirectory.
    pub fn run(&self, input: DynamicImage, label: &str) -> Result<PipelineTrace> {
        self.run_partial(input, label, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(
        &self,
        input: DynamicImage,
        label: &str,
        num_steps: usize,
    ) -> Result<PipelineTrace> {
        if let Some(debug_config) = &self.context.debug {
            debug_config.save(label, "00_input.png", &input)?;
        }

        let mut data = PipelineData::from_image(input);
        let mut trace = PipelineTrace {
            input: data.original.clone(),
            stages: Vec::with_capacity(num_steps.min(self.steps.len())),
        };

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            let step_name = step.name();
            debug!("Running step {}: {}", step_idx + 1, step_name);

            data = step.process(data, &self.context)?;

            debug!(
                "  → {}x{} {:?}",
                data.image.width(),
                data.image.height(),
                data.image.color()
            );

            if let Some(debug_config) = &self.context.debug {
                let file_name = format!("{:02}_{}.png", step_idx + 1, stage_file_stem(step_name));
                debug_config.save(label, &file_name, &data.image)?;
            }

            trace.stages.push((step_name.to_string(), data.clone()));
        }

        Ok(trace)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn stage_file_stem(step_name: &str) -> String {
    step_name.to_lowercase().replace(' ', "_")
}

/// Debug label for an image path (its file stem)
pub fn debug_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
