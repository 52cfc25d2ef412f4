use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lcd_meter::capture::{DEFAULT_CAPTURE_DIR, DEFAULT_TIMEOUT, DEFAULT_URL};
use lcd_meter::detection::classifier::{DigitClassifier, FixedReading, SevenSegmentClassifier};
use lcd_meter::table::DEFAULT_TABLE_PATH;
use lcd_meter::{
    Clock, FsSink, HttpImageSource, ImageSource, LocalImageSource, MeterReader, MeterReaderConfig,
    OutputSink, Roi, Session, SessionConfig,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassifierKind {
    /// Template matching against seven-segment digit shapes
    SevenSegment,
    /// Always report --fixed-reading
    Fixed,
}

#[derive(Parser)]
#[command(name = "lcd-meter")]
#[command(about = "Capture and process LCD meter readings from camera")]
struct Cli {
    /// URL to capture images from
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Region of interest as x,y,width,height (e.g., '187,188,275,146')
    #[arg(long, default_value_t = Roi::default().to_string())]
    roi: String,

    /// Number of readings to capture
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    /// Time between readings in seconds
    #[arg(long, default_value_t = 1.0)]
    interval: f64,

    /// Process a single existing image instead of capturing from URL
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Directory downloaded captures are saved to
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CAPTURE_DIR)]
    capture_dir: PathBuf,

    /// CSV file readings are appended to
    #[arg(long, value_name = "FILE", default_value = DEFAULT_TABLE_PATH)]
    table: PathBuf,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// How digits are recognized
    #[arg(long, value_enum, default_value_t = ClassifierKind::SevenSegment)]
    classifier: ClassifierKind,

    /// Reading reported by the fixed classifier
    #[arg(long, default_value = "16737")]
    fixed_reading: String,

    /// Save every pipeline stage image below this directory
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Error: failed to initialize logging: {}", e);
        return ExitCode::from(1);
    }

    // Configuration errors end the run before any capture is attempted
    let roi: Roi = match args.roi.parse() {
        Ok(roi) => roi,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(&args, roi) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Cli, roi: Roi) -> Result<()> {
    // Resolve the local offset before the HTTP client starts its threads
    let clock = Clock::local();
    let sink: Arc<dyn OutputSink> = Arc::new(FsSink);

    let classifier: Box<dyn DigitClassifier> = match args.classifier {
        ClassifierKind::SevenSegment => Box::new(SevenSegmentClassifier::default()),
        ClassifierKind::Fixed => Box::new(FixedReading::new(args.fixed_reading.clone())),
    };

    let mut reader = MeterReader::new(MeterReaderConfig::default().with_roi(roi), classifier);
    if let Some(debug_dir) = &args.debug_out {
        reader = reader.with_debug(debug_dir.clone(), sink.clone());
    }
    info!("Reading ROI {} with the {} classifier", roi, reader.classifier_name());

    if let Some(image_path) = &args.image {
        let mut source = LocalImageSource::new(image_path.clone());
        let captured = source.acquire()?;
        let reading = reader.process(&captured, sink.as_ref())?;
        println!("Reading: {} kWh", reading);
        return Ok(());
    }

    let interval = Duration::try_from_secs_f64(args.interval)
        .with_context(|| format!("Invalid interval: {}", args.interval))?;

    let mut source = HttpImageSource::new(
        args.url.clone(),
        args.capture_dir.clone(),
        Duration::from_secs(args.timeout),
        sink.clone(),
        clock,
    )?;

    let config = SessionConfig {
        count: args.count,
        interval,
        table_path: args.table.clone(),
    };
    Session::new(&reader, sink.as_ref(), clock, config).run(&mut source)?;

    Ok(())
}
