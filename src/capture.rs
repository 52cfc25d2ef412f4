//! Image sources: an HTTP camera endpoint or a photo already on disk

use anyhow::{Context, Result, anyhow};
use image::ImageReader;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::clock::Clock;
use crate::error::MeterError;
use crate::models::CapturedImage;
use crate::sink::OutputSink;

pub const DEFAULT_URL: &str = "http://192.168.0.2:8081/capture/flash";
pub const DEFAULT_CAPTURE_DIR: &str = "meter_images";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub trait ImageSource {
    /// Produce the next photo of the meter
    fn acquire(&mut self) -> Result<CapturedImage>;
}

/// Downloads a photo per capture and keeps the raw bytes in a capture directory
pub struct HttpImageSource {
    url: String,
    capture_dir: PathBuf,
    client: Client,
    sink: Arc<dyn OutputSink>,
    clock: Clock,
}

impl HttpImageSource {
    pub fn new(
        url: impl Into<String>,
        capture_dir: impl Into<PathBuf>,
        timeout: Duration,
        sink: Arc<dyn OutputSink>,
        clock: Clock,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            url: url.into(),
            capture_dir: capture_dir.into(),
            client,
            sink,
            clock,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `meter_YYYYMMDD_HHMMSS.jpg` inside the capture directory
    pub fn next_capture_path(&self) -> PathBuf {
        self.capture_dir
            .join(format!("meter_{}.jpg", self.clock.filename_stamp()))
    }
}

impl ImageSource for HttpImageSource {
    fn acquire(&mut self) -> Result<CapturedImage> {
        self.sink.create_dir_all(&self.capture_dir)?;
        let path = self.next_capture_path();

        info!("Downloading image from {}...", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("Error downloading image from {}", self.url))?;

        if response.status() != StatusCode::OK {
            return Err(MeterError::HttpStatus {
                status: response.status().as_u16(),
                url: self.url.clone(),
            }
            .into());
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("Error reading image body from {}", self.url))?;
        self.sink.write(&path, &bytes)?;
        info!("Image saved: {}", path.display());

        let image = image::load_from_memory(&bytes)
            .map_err(|e| anyhow!("Could not read image {}: {}", path.display(), e))?;

        Ok(CapturedImage { image, path })
    }
}

/// Serves the same photo from disk on every capture
pub struct LocalImageSource {
    path: PathBuf,
}

impl LocalImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for LocalImageSource {
    fn acquire(&mut self) -> Result<CapturedImage> {
        if !self.path.is_file() {
            return Err(MeterError::ImageNotFound(self.path.clone()).into());
        }

        let image = ImageReader::open(&self.path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| anyhow!("Could not read image {}: {}", self.path.display(), e))?;

        Ok(CapturedImage {
            image,
            path: self.path.clone(),
        })
    }
}
