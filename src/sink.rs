//! Output sinks
//!
//! Every file the reader produces (downloaded captures, annotated results,
//! debug stages and the readings table) goes through an [`OutputSink`], so
//! the pipeline can run against the file system or entirely in memory.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

pub trait OutputSink: Send + Sync {
    /// Create a directory and its parents; a no-op when it already exists
    fn create_dir_all(&self, dir: &Path) -> Result<()>;

    /// Create or replace a file
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Append to a file, creating it when absent
    fn append(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Encode an image and write it through the sink
pub fn save_image(
    sink: &dyn OutputSink,
    path: &Path,
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<()> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| anyhow!("Failed to encode {}: {}", path.display(), e))?;
    sink.write(path, &buf)
}

/// Writes to the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSink;

impl OutputSink for FsSink {
    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        if dir.as_os_str().is_empty() || dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        info!("Created directory: {}", dir.display());
        Ok(())
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn append(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for appending", path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Keeps every written file in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of all files written so far, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Directories created so far, sorted
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs
            .lock()
            .map(|dirs| dirs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path.as_ref()).cloned()
    }
}

impl OutputSink for MemorySink {
    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        let mut dirs = self.dirs.lock().map_err(|_| anyhow!("memory sink poisoned"))?;
        for ancestor in dir.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut files = self.files.lock().map_err(|_| anyhow!("memory sink poisoned"))?;
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn append(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut files = self.files.lock().map_err(|_| anyhow!("memory sink poisoned"))?;
        files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let is_file = self
            .files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false);
        is_file
            || self
                .dirs
                .lock()
                .map(|dirs| dirs.contains(path))
                .unwrap_or(false)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| anyhow!("No such file in memory sink: {}", path.display()))
    }
}
