//! End-to-end tests driving the `deskew` binary.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

use deskew_core::{
    read, rotate, write, ImageHandle, PixelDepth, Resolution, SkewEstimator, WriteOptions,
};

fn deskew(args: &[&OsStr]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deskew"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run deskew")
}

/// White page with evenly spaced bars of black "words", rotated by `angle`.
fn page(angle: f64) -> ImageHandle {
    let (width, height) = (500u32, 700u32);
    let mut img = ImageHandle::new(width, height, PixelDepth::Bit8, Resolution::uniform(300)).unwrap();
    let mut top = 40;
    while top + 48 <= height {
        let mut x = 40 + (top % 30);
        while x + 20 < width - 40 {
            for y in top..top + 8 {
                for px in x..x + 35 {
                    img.set_pixel(px, y, 0);
                }
            }
            x += 35 + 12;
        }
        top += 24;
    }
    rotate(&img, angle)
}

fn write_page(path: &Path, angle: f64) {
    write(path, &page(angle), &WriteOptions::default()).unwrap();
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_deskews_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.tif");
    write_page(&input, 3.0);

    let result = deskew(&[input.as_os_str(), output.as_os_str()]);
    assert_eq!(result.status.code(), Some(0), "stderr: {}", stderr(&result));
    assert!(result.stdout.is_empty());

    let corrected = read(&output).unwrap();
    assert!(corrected.width() > 500);
    assert_eq!(corrected.resolution(), Resolution::uniform(300));

    let residual = SkewEstimator::default().estimate(&corrected, 0);
    assert!(residual.angle.abs() < 0.5, "residual skew {}", residual.angle);
    assert!(residual.is_confident(3.0), "confidence {}", residual.confidence);
}

#[test]
fn test_explicit_dpi() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pgm");
    let output = dir.path().join("out.pgm");
    write_page(&input, -2.0);

    for dpi in ["100", "300"] {
        let result = deskew(&[
            OsStr::new("-r"),
            OsStr::new(dpi),
            input.as_os_str(),
            output.as_os_str(),
        ]);
        assert_eq!(result.status.code(), Some(0), "stderr: {}", stderr(&result));
        assert!(output.exists());
    }
}

#[test]
fn test_measure_prints_angle_and_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_page(&input, -2.0);

    let result = deskew(&[
        OsStr::new("--measure"),
        OsStr::new("--dpi"),
        OsStr::new("150"),
        input.as_os_str(),
    ]);
    assert_eq!(result.status.code(), Some(0), "stderr: {}", stderr(&result));

    let stdout = String::from_utf8(result.stdout).unwrap();
    let fields: Vec<f64> = stdout
        .split_whitespace()
        .map(|field| field.parse().unwrap())
        .collect();
    assert_eq!(fields.len(), 2, "stdout: {stdout}");
    assert!((fields[0] - 2.0).abs() < 0.5, "angle {}", fields[0]);
    assert!(fields[1] >= 3.0, "confidence {}", fields[1]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_input_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("does-not-exist.tif");
    let output = dir.path().join("out.tif");

    let result = deskew(&[input.as_os_str(), output.as_os_str()]);
    assert_eq!(result.status.code(), Some(2));
    assert!(stderr(&result).contains("does-not-exist.tif"));
    assert!(!output.exists());
}

#[test]
fn test_corrupt_input_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("corrupt.tif");
    std::fs::write(&input, b"II*\0garbage that is not a tiff").unwrap();
    let output = dir.path().join("out.tif");

    let result = deskew(&[input.as_os_str(), output.as_os_str()]);
    assert_eq!(result.status.code(), Some(2));
    assert!(stderr(&result).contains("corrupt.tif"));
    assert!(!output.exists());
}

#[test]
fn test_unwritable_output_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_page(&input, 1.0);
    let output = dir.path().join("no-such-dir").join("out.png");

    let result = deskew(&[input.as_os_str(), output.as_os_str()]);
    assert_eq!(result.status.code(), Some(5));
    assert!(stderr(&result).contains("no-such-dir"));
}

#[test]
fn test_unsupported_output_format_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_page(&input, 1.0);
    let output = dir.path().join("out.gif");

    let result = deskew(&[input.as_os_str(), output.as_os_str()]);
    assert_eq!(result.status.code(), Some(5));
    assert!(stderr(&result).contains("out.gif"));
    assert!(!output.exists());
}

#[test]
fn test_missing_outfile_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    write_page(&input, 1.0);

    let result = deskew(&[input.as_os_str()]);
    assert_eq!(result.status.code(), Some(2));
    assert!(!result.stderr.is_empty());
}
