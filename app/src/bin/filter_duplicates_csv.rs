use std::{io::Write, path::PathBuf};

use clap::Parser;
use common::{
    csv_filter::filter_csv,
    util::{output_to, read_from},
};
use eyre::Result;
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter duplicate readings from CSV file; one equal reading is enough to
/// make the row a candidate for removal
#[derive(Parser)]
struct Cli {
    /// file to filter (default: stdin)
    source_file: Option<PathBuf>,
    /// destination file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging();

    let input = read_from(args.source_file.as_deref())?;
    let mut output = output_to(args.output.as_deref())?;
    filter_csv(input, &mut output)?;
    output.flush()?;
    Ok(())
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    tracing_subscriber::registry()
        .with(EnvFilter::new(format!(
            "common={log_level},filter_duplicates_csv={log_level}"
        )))
        .with(layer().compact().with_writer(std::io::stderr))
        .init();
}
