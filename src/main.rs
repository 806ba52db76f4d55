//! dicom-tiles - Inspect and decode tiled DICOM series.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dicom_tile_reader::config::{Cli, Command, InfoArgs, ReadArgs};
use dicom_tile_reader::open_series;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Info(args) => run_info(args).await,
        Command::Files(args) => run_files(args).await,
        Command::Read(args) => run_read(args).await,
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "dicom_tile_reader=debug,dicom_tiles=debug"
    } else {
        "dicom_tile_reader=info,dicom_tiles=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(args: InfoArgs) -> ExitCode {
    let series = match open_series(&args.path, &args.reader.to_config()).await {
        Ok(series) => series,
        Err(e) => {
            error!("Cannot open {}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&series.metadata()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Cannot serialize metadata: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Files Command
// =============================================================================

async fn run_files(args: InfoArgs) -> ExitCode {
    let series = match open_series(&args.path, &args.reader.to_config()).await {
        Ok(series) => series,
        Err(e) => {
            error!("Cannot open {}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    for file in series.used_files() {
        println!("{}", file.display());
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Read Command
// =============================================================================

async fn run_read(args: ReadArgs) -> ExitCode {
    let series = match open_series(&args.path, &args.reader.to_config()).await {
        Ok(series) => series,
        Err(e) => {
            error!("Cannot open {}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let geometry = series.catalog().geometry();
    let width = args
        .width
        .unwrap_or_else(|| geometry.width.saturating_sub(args.x));
    let height = args
        .height
        .unwrap_or_else(|| geometry.height.saturating_sub(args.y));

    let samples = match series
        .open_plane(args.plane, args.x, args.y, width, height)
        .await
    {
        Ok(samples) => samples,
        Err(e) => {
            error!("Read failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::write(&args.output, &samples).await {
        error!("Cannot write {}: {}", args.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {}x{} region of plane {} ({} bytes, {:?}) to {}",
        width,
        height,
        args.plane,
        samples.len(),
        series.layout(),
        args.output.display()
    );
    ExitCode::SUCCESS
}
