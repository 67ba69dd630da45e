use std::{io::Write, path::PathBuf};

use clap::Parser;
use common::{
    filter::{TargetMode, filter_report},
    report::Report,
    util::{output_to, read_from},
};
use eyre::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter duplicate sensor readings
#[derive(Parser)]
struct Cli {
    /// file to extract from (default: stdin)
    source_file: Option<PathBuf>,
    /// destination file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// which targets to filter
    #[arg(short, long, default_value = "auto", value_parser = ["cpu", "gpu", "all", "auto"])]
    target: String,
    /// filter all readings if all are duplicates (default: do not filter
    /// first and last)
    #[arg(long, default_value_t = false)]
    filter_all: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging();

    let mode = TargetMode::from_name(&args.target)?;
    let mut report: Report = serde_json::from_reader(read_from(args.source_file.as_deref())?)
        .context("Parse benchmark report")?;
    filter_report(&mut report, mode, args.filter_all)?;

    let mut out = output_to(args.output.as_deref())?;
    serde_json::to_writer(&mut out, &report).context("Serialize benchmark report")?;
    out.flush()?;
    Ok(())
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    tracing_subscriber::registry()
        .with(EnvFilter::new(format!(
            "common={log_level},filter_duplicates={log_level}"
        )))
        .with(layer().compact().with_writer(std::io::stderr))
        .init();
}
