use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use common::{
    plot::{
        Backend, build_chart, check_unique_units, convert_input, merge_specs, parse_column_specs,
        parse_units, render, validate_axes,
    },
    util::{output_to, read_from},
};
use eyre::Result;
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate plot from CSV file
#[derive(Parser)]
struct Cli {
    /// file to extract from (default: stdin)
    source_file: Option<PathBuf>,
    /// destination file or stdout if not present
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// column(s) to use as the x values, with booleans that indicate whether
    /// to subtract the first x value of the corresponding column from the rest
    #[arg(short = 'x', long = "x-plots", required = true, num_args = 1.., value_name = "NAME=BOOL")]
    x_plots: Vec<String>,
    /// column(s) to use as the y values, with booleans that indicate whether
    /// to subtract the first y value of the corresponding column from the rest
    #[arg(short = 'y', long = "y-plots", required = true, num_args = 1.., value_name = "NAME=BOOL")]
    y_plots: Vec<String>,
    /// plot title
    #[arg(short, long)]
    title: Option<String>,
    /// plot units
    #[arg(short, long, num_args = 0.., value_name = "NAME=UNIT")]
    units: Vec<String>,
    /// backend to use when generating plot
    #[arg(short, long, default_value = "agg", value_parser = ["agg", "pdf", "svg"])]
    backend: String,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging();

    let backend = Backend::from_str(&args.backend)?;
    let x = parse_column_specs(&args.x_plots)?;
    let y = parse_column_specs(&args.y_plots)?;
    let units = parse_units(&args.units)?;
    validate_axes(&x, &y)?;
    check_unique_units(&x, &units)?;

    let input = read_from(args.source_file.as_deref())?;
    let columns = convert_input(input, &merge_specs(&x, &y))?;

    let title = match (&args.title, &args.source_file) {
        (Some(title), _) => title.clone(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => "<stdin>".to_owned(),
    };
    let chart = build_chart(&title, &x, &y, &units, &columns)?;

    let mut out = output_to(args.output.as_deref())?;
    render(&chart, backend, &mut *out)?;
    Ok(())
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    tracing_subscriber::registry()
        .with(EnvFilter::new(format!("common={log_level},plot={log_level}")))
        .with(layer().compact().with_writer(std::io::stderr))
        .init();
}
