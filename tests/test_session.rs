//! Session driving and readings table persistence.

mod common;

use std::time::Duration;

use lcd_meter::detection::classifier::SevenSegmentClassifier;

use common::*;

/// Shows the display with a bright bar no digit template fits
struct SmudgedSource;

impl ImageSource for SmudgedSource {
    fn acquire(&mut self) -> anyhow::Result<CapturedImage> {
        let mut frame = render_meter("").to_rgb8();
        let roi = test_roi();
        for x in roi.x + 20..roi.x + 200 {
            for y in roi.y + 30..roi.y + 38 {
                frame.put_pixel(x, y, SEGMENT_ON);
            }
        }
        Ok(CapturedImage {
            image: image::DynamicImage::ImageRgb8(frame),
            path: "captures/smudged.jpg".into(),
        })
    }
}

fn session_config(count: u32, table: impl Into<std::path::PathBuf>) -> SessionConfig {
    SessionConfig {
        count,
        interval: Duration::ZERO,
        table_path: table.into(),
    }
}

#[test]
fn test_failed_capture_is_skipped() -> anyhow::Result<()> {
    // 1. Source fails on the second of three attempts
    let sink = MemorySink::new();
    let reader = fixed_reader();
    let mut source = FlakySource::new("captures", vec![2]);

    // 2. Run the session
    let clock = Clock::Fixed(fixed_time(0));
    let session = Session::new(&reader, &sink, clock, session_config(3, "readings.csv"));
    let report = session.run(&mut source)?;

    // 3. Every attempt was made, two succeeded
    assert_eq!(source.attempts, 3);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.records.len(), 2);
    assert!(report.records.iter().all(|r| r.reading == "16737"));
    assert!(report.summary().contains("Total captures: 2/3"));

    // 4. Only the successful captures produced annotated images
    let files = sink.files();
    assert!(files.iter().any(|p| p.ends_with("meter_1_result.jpg")));
    assert!(files.iter().any(|p| p.ends_with("meter_3_roi.jpg")));
    assert!(!files.iter().any(|p| p.to_string_lossy().contains("meter_2_")));

    // 5. Table has a header and both readings
    let table = String::from_utf8(sink.read(std::path::Path::new("readings.csv"))?)?;
    assert_eq!(
        table,
        "timestamp,reading_kwh\n2024-03-01 12:00:00,16737\n2024-03-01 12:00:00,16737\n"
    );

    Ok(())
}

#[test]
fn test_unreadable_display_is_not_recorded() -> anyhow::Result<()> {
    let sink = MemorySink::new();
    let reader = MeterReader::new(
        MeterReaderConfig::default().with_roi(test_roi()),
        Box::new(SevenSegmentClassifier::default()),
    );

    let session = Session::new(&reader, &sink, Clock::utc(), session_config(2, "readings.csv"));
    let report = session.run(&mut SmudgedSource)?;

    assert!(report.records.is_empty());
    assert!(!sink.exists(std::path::Path::new("readings.csv")));

    Ok(())
}

#[test]
fn test_summary_lists_readings() {
    let report = SessionReport {
        attempted: 3,
        records: vec![
            ReadingRecord::new(fixed_time(1), "16737"),
            ReadingRecord::new(fixed_time(4), "16738"),
        ],
    };

    let expected = format!(
        concat!(
            "\nCapture Summary:\n{}\n",
            "Total captures: 2/3\n",
            "\nTimestamp                Reading (kWh)\n{}\n",
            "2024-03-01 12:00:01    16737\n",
            "2024-03-01 12:00:04    16738\n",
        ),
        "=".repeat(60),
        "-".repeat(40)
    );
    assert_eq!(report.to_string(), expected);
    assert_eq!(report.summary(), expected);
}

#[test]
fn test_no_successful_captures_writes_no_table() -> anyhow::Result<()> {
    let sink = MemorySink::new();
    let reader = fixed_reader();
    let mut source = FlakySource::new("captures", vec![1, 2]);

    let session = Session::new(&reader, &sink, Clock::utc(), session_config(2, "readings.csv"));
    let report = session.run(&mut source)?;

    assert!(report.records.is_empty());
    assert!(report.summary().contains("Total captures: 0/2"));
    assert!(!report.summary().contains("Reading (kWh)"));
    assert!(!sink.exists(std::path::Path::new("readings.csv")));

    Ok(())
}

#[test]
fn test_interval_only_between_captures() -> anyhow::Result<()> {
    let sink = MemorySink::new();
    let reader = fixed_reader();
    let interval = Duration::from_millis(150);

    // A single capture never sleeps
    let mut source = FlakySource::new("captures", vec![]);
    let config = SessionConfig {
        interval,
        ..session_config(1, "readings.csv")
    };
    let started = std::time::Instant::now();
    Session::new(&reader, &sink, Clock::utc(), config).run(&mut source)?;
    assert!(started.elapsed() < interval);

    // Three captures sleep twice, even around a failure
    let mut source = FlakySource::new("captures", vec![2]);
    let config = SessionConfig {
        interval,
        ..session_config(3, "readings.csv")
    };
    let started = std::time::Instant::now();
    Session::new(&reader, &sink, Clock::utc(), config).run(&mut source)?;
    assert!(started.elapsed() >= interval * 2);

    Ok(())
}

#[test]
fn test_table_accumulates_across_sessions() -> anyhow::Result<()> {
    // 1. Empty directory on disk
    let dir = tempfile::TempDir::new()?;
    let table_path = dir.path().join("meter_readings.csv");
    let reader = fixed_reader();

    // 2. First session: two readings
    let mut source = FlakySource::new(dir.path(), vec![]);
    let config = session_config(2, &table_path);
    Session::new(&reader, &FsSink, Clock::Fixed(fixed_time(1)), config).run(&mut source)?;

    // 3. Second session: one reading
    let mut source = FlakySource::new(dir.path(), vec![]);
    let config = session_config(1, &table_path);
    Session::new(&reader, &FsSink, Clock::Fixed(fixed_time(2)), config).run(&mut source)?;

    // 4. One header, then both runs in order
    let text = std::fs::read_to_string(&table_path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "timestamp,reading_kwh",
            "2024-03-01 12:00:01,16737",
            "2024-03-01 12:00:01,16737",
            "2024-03-01 12:00:02,16737",
        ]
    );

    let records = ReadingTable::new(&table_path).load(&FsSink)?;
    assert_eq!(records.len(), 3);
    assert_eq!(records[2], ReadingRecord::new(fixed_time(2), "16737"));

    // Annotated images landed next to the captures
    assert!(dir.path().join("meter_1_result.jpg").is_file());
    assert!(dir.path().join("meter_1_roi.jpg").is_file());

    Ok(())
}

#[test]
fn test_table_header_written_once() -> anyhow::Result<()> {
    let sink = MemorySink::new();
    let table = ReadingTable::new("t.csv");

    table.append(&sink, &[ReadingRecord::new(fixed_time(5), "1")])?;
    let later = [
        ReadingRecord::new(fixed_time(6), "2"),
        ReadingRecord::new(fixed_time(7), "3"),
    ];
    table.append(&sink, &later)?;

    let text = String::from_utf8(sink.read(std::path::Path::new("t.csv"))?)?;
    assert_eq!(text.matches("timestamp,reading_kwh").count(), 1);

    let readings: Vec<String> = table.load(&sink)?.into_iter().map(|r| r.reading).collect();
    assert_eq!(readings, vec!["1", "2", "3"]);

    Ok(())
}

#[test]
fn test_table_rejects_garbage_rows() -> anyhow::Result<()> {
    let sink = MemorySink::new();
    sink.write(std::path::Path::new("t.csv"), b"timestamp,reading_kwh\nnot a row\n")?;
    assert!(ReadingTable::new("t.csv").load(&sink).is_err());
    Ok(())
}
