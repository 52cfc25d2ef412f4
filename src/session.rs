//! Multi-capture session: capture, read, record, repeat

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::capture::ImageSource;
use crate::clock::Clock;
use crate::detection::MeterReader;
use crate::models::ReadingRecord;
use crate::sink::OutputSink;
use crate::table::{DEFAULT_TABLE_PATH, ReadingTable};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of capture attempts
    pub count: u32,
    /// Pause between attempts
    pub interval: Duration,
    pub table_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            count: 1,
            interval: Duration::from_secs(1),
            table_path: PathBuf::from(DEFAULT_TABLE_PATH),
        }
    }
}

/// Outcome of a session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub attempted: u32,
    pub records: Vec<ReadingRecord>,
}

impl SessionReport {
    /// Printable summary: success ratio, then one line per reading
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nCapture Summary:")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Total captures: {}/{}", self.records.len(), self.attempted)?;

        if !self.records.is_empty() {
            writeln!(f, "\nTimestamp                Reading (kWh)")?;
            writeln!(f, "{}", "-".repeat(40))?;
            for record in &self.records {
                writeln!(f, "{}    {}", record.timestamp_string(), record.reading)?;
            }
        }
        Ok(())
    }
}

pub struct Session<'a> {
    reader: &'a MeterReader,
    sink: &'a dyn OutputSink,
    clock: Clock,
    config: SessionConfig,
}

impl<'a> Session<'a> {
    pub fn new(
        reader: &'a MeterReader,
        sink: &'a dyn OutputSink,
        clock: Clock,
        config: SessionConfig,
    ) -> Self {
        Self {
            reader,
            sink,
            clock,
            config,
        }
    }

    /// Run every capture attempt, print the summary and append successful
    /// readings to the table. A failed attempt is logged and skipped.
    pub fn run(&self, source: &mut dyn ImageSource) -> Result<SessionReport> {
        let count = self.config.count;
        println!(
            "Starting to capture {} meter readings at {:?}s intervals",
            count,
            self.config.interval.as_secs_f64()
        );
        println!("{}", "=".repeat(60));

        let mut records = Vec::new();
        for attempt in 1..=count {
            match self.capture_once(source) {
                Ok(reading) => {
                    println!("Capture {}/{}: {} kWh", attempt, count, reading);
                    records.push(ReadingRecord::new(self.clock.now(), reading));
                }
                Err(e) => warn!("Capture {}/{} failed. Skipping: {:#}", attempt, count, e),
            }

            if attempt < count {
                std::thread::sleep(self.config.interval);
            }
        }

        let report = SessionReport {
            attempted: count,
            records,
        };
        print!("{}", report);

        if !report.records.is_empty() {
            let table = ReadingTable::new(&self.config.table_path);
            table.append(self.sink, &report.records)?;
            println!("\nReadings saved to: {}", table.path().display());
            info!("Appended {} readings to {}", report.records.len(), table.path().display());
        }

        Ok(report)
    }

    fn capture_once(&self, source: &mut dyn ImageSource) -> Result<String> {
        let captured = source.acquire()?;
        self.reader.process(&captured, self.sink)
    }
}
