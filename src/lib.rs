pub mod capture;
pub mod clock;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod table;

pub use capture::{HttpImageSource, ImageSource, LocalImageSource};
pub use clock::Clock;
pub use detection::{MeterAnalysis, MeterReader, MeterReaderConfig};
pub use error::MeterError;
pub use models::{BoundingBox, CapturedImage, DigitCandidate, ReadingRecord, Roi};
pub use pipeline::{Pipeline, PipelineContext, PipelineData, PipelineStep, PipelineTrace};
pub use session::{Session, SessionConfig, SessionReport};
pub use sink::{FsSink, MemorySink, OutputSink};
pub use table::ReadingTable;
