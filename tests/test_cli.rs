//! End-to-end runs of the `lcd-meter` binary.

mod common;

use std::path::Path;
use std::process::{Command, Output};

use image::ImageFormat;

use common::*;

fn lcd_meter(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lcd-meter"))
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("run lcd-meter")
}

#[test]
fn test_malformed_roi_exits_before_capturing() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;

    for roi in ["1,2,3", "a,b,c,d", "1,2,0,4"] {
        let output = lcd_meter(
            dir.path(),
            &["--roi", roi, "--url", "http://127.0.0.1:9/capture", "--timeout", "1"],
        );
        assert_eq!(output.status.code(), Some(1), "roi {:?}", roi);
        assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
    }

    // No capture directory, no table
    assert!(!dir.path().join("meter_images").exists());
    assert!(!dir.path().join("meter_readings.csv").exists());

    Ok(())
}

#[test]
fn test_missing_image_exits_with_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;

    let output = lcd_meter(dir.path(), &["--image", "nope.jpg"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.jpg"));

    Ok(())
}

#[test]
fn test_single_image_mode_writes_annotations() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    render_meter("16737").save_with_format(dir.path().join("meter.png"), ImageFormat::Png)?;

    let output = lcd_meter(
        dir.path(),
        &["--image", "meter.png", "--roi", "40,40,320,80", "--classifier", "fixed"],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Reading: 16737 kWh"));

    assert!(dir.path().join("meter_result.jpg").is_file());
    assert!(dir.path().join("meter_roi.jpg").is_file());
    // Single image runs are not recorded
    assert!(!dir.path().join("meter_readings.csv").exists());

    Ok(())
}

#[test]
fn test_unreachable_camera_records_nothing() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;

    let output = lcd_meter(
        dir.path(),
        &[
            "--url",
            "http://127.0.0.1:9/capture",
            "--count",
            "2",
            "--interval",
            "0",
            "--timeout",
            "1",
        ],
    );
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Starting to capture 2 meter readings at 0.0s intervals"));
    assert!(stdout.contains("Total captures: 0/2"));
    assert!(!dir.path().join("meter_readings.csv").exists());

    Ok(())
}

#[test]
fn test_zero_count_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let output = lcd_meter(dir.path(), &["--count", "0"]);
    assert!(!output.status.success());
    Ok(())
}
