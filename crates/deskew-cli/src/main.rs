//! `deskew` - straighten scanned pages before OCR.
//!
//! Reads a TIFF/PNM/PNG/JPEG page, measures its skew and writes a rotated
//! copy in the format implied by the output extension.
//!
//! Exit codes: 0 success, 2 input unreadable (or bad usage), 3 missing codec
//! capability, 5 output not writable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use deskew_core::{DeskewConfig, DeskewError, Deskewer, WriteOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "deskew")]
#[command(version, about = "Detect and correct the skew of scanned pages", long_about = None)]
struct Cli {
    /// Scan resolution in DPI; below 150 the search runs at full resolution.
    /// Defaults to the resolution stored in the input file.
    #[arg(short = 'r', long)]
    dpi: Option<u32>,

    /// JPEG output quality (1-100, 0 = encoder default)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    jpeg_quality: u8,

    /// Request progressive JPEG output
    #[arg(long)]
    progressive: bool,

    /// Only measure: print "<angle> <confidence>" and write nothing
    #[arg(long)]
    measure: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Input image
    infile: PathBuf,

    /// Output image; the extension selects the format
    #[arg(required_unless_present = "measure")]
    outfile: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("deskew: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), DeskewError> {
    let config = DeskewConfig {
        write: WriteOptions {
            jpeg_quality: cli.jpeg_quality,
            jpeg_progressive: cli.progressive,
        },
        ..DeskewConfig::default()
    };
    let deskewer = Deskewer::new(config)?;

    let Some(outfile) = cli.outfile.as_deref().filter(|_| !cli.measure) else {
        let estimate = deskewer.find_skew_file(&cli.infile, cli.dpi)?;
        println!("{:.2} {:.2}", estimate.angle, estimate.confidence);
        return Ok(());
    };

    let report = deskewer.deskew_file(&cli.infile, outfile, cli.dpi)?;
    tracing::info!(
        angle = report.estimate.angle,
        confidence = report.estimate.confidence,
        rotated = report.rotated,
        width = report.width,
        height = report.height,
        "Done"
    );
    Ok(())
}
