//! The persisted readings table: a flat CSV that is only ever appended to

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};

use crate::clock;
use crate::models::ReadingRecord;
use crate::sink::OutputSink;

pub const TABLE_HEADER: &str = "timestamp,reading_kwh";
pub const DEFAULT_TABLE_PATH: &str = "meter_readings.csv";

#[derive(Debug, Clone)]
pub struct ReadingTable {
    path: PathBuf,
}

impl ReadingTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records in order. The header is written only when the table
    /// does not exist yet.
    pub fn append(&self, sink: &dyn OutputSink, records: &[ReadingRecord]) -> Result<()> {
        let mut out = String::new();
        if !sink.exists(&self.path) {
            out.push_str(TABLE_HEADER);
            out.push('\n');
        }
        for record in records {
            out.push_str(&record.timestamp_string());
            out.push(',');
            out.push_str(&record.reading);
            out.push('\n');
        }

        sink.append(&self.path, out.as_bytes())
            .with_context(|| format!("Failed to save readings to {}", self.path.display()))
    }

    /// Read every record back, skipping the header
    pub fn load(&self, sink: &dyn OutputSink) -> Result<Vec<ReadingRecord>> {
        let bytes = sink.read(&self.path)?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", self.path.display()))?;

        text.lines()
            .enumerate()
            .filter(|(idx, line)| !(*idx == 0 && *line == TABLE_HEADER) && !line.is_empty())
            .map(|(idx, line)| {
                let (timestamp, reading) = line
                    .split_once(',')
                    .ok_or_else(|| anyhow!("line {}: expected timestamp,reading", idx + 1))?;
                let timestamp = clock::parse_timestamp(timestamp)
                    .with_context(|| format!("line {}: bad timestamp {:?}", idx + 1, timestamp))?;
                Ok(ReadingRecord::new(timestamp, reading))
            })
            .collect()
    }
}
