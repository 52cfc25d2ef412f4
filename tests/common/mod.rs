mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from lcd_meter for tests
pub use lcd_meter::{
    CapturedImage, Clock, FsSink, ImageSource, MemorySink, MeterError, MeterReader,
    MeterReaderConfig, OutputSink, ReadingRecord, ReadingTable, Roi, Session, SessionConfig,
    SessionReport,
};
