//! dzi-tiler - convert an image or whole slide image to a Deep Zoom pyramid.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dzi_tiler::config::{Config, ReportFormat};
use dzi_tiler::pipeline::{self, PyramidReport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    info!("Converting {}", config.input.display());

    match pipeline::run(&config).await {
        Ok(report) => print_report(&report, config.report),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "dzi_tiler=debug"
    } else {
        "dzi_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_report(report: &PyramidReport, format: ReportFormat) -> ExitCode {
    match format {
        ReportFormat::Text => {
            print!("{}", report.to_text());
        }
        ReportFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    ExitCode::SUCCESS
}
