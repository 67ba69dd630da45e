use std::{
    io::{BufRead, BufReader, Read, Write},
    str::FromStr,
};

use eyre::Result;
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use itertools::Itertools;
use plotters::{coord::Shift, prelude::*};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("'{0}' is not a valid column")]
    UnknownColumn(String),
    #[error("if more than one X, then number ({x}) must match Y count ({y})")]
    AxisCountMismatch { x: usize, y: usize },
    #[error("units for x plots must be the same (got {})", .0.join(", "))]
    InconsistentUnits(Vec<String>),
    #[error("key cannot be empty in '{0}'")]
    EmptyKey(String),
    #[error("unit for '{0}' cannot be empty")]
    EmptyUnit(String),
    #[error("invalid boolean value '{0}'")]
    InvalidBool(String),
    #[error("backend '{0}' is not supported")]
    UnsupportedBackend(String),
    #[error("column '{column}' has non-numeric value '{value}'")]
    NotNumeric { column: String, value: String },
    #[error("row {line} is missing column '{column}'")]
    MissingField { line: usize, column: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One selected column and whether to subtract the column's first value
/// from every sample (baseline correction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub baseline: bool,
}

/// Parses `NAME=BOOL` pairs into ordered column specs. A bare `NAME` (or
/// empty value) selects the column without baseline correction; a repeated
/// name overrides the earlier flag while keeping its position.
pub fn parse_column_specs(pairs: &[String]) -> Result<Vec<ColumnSpec>, PlotError> {
    let mut specs: Vec<ColumnSpec> = Vec::new();
    for pair in pairs {
        let (name, value) = split_pair(pair)?;
        let baseline = match value {
            Some(v) if !v.is_empty() => parse_bool(v)?,
            _ => false,
        };
        match specs.iter_mut().find(|s| s.name == name) {
            Some(spec) => spec.baseline = baseline,
            None => specs.push(ColumnSpec {
                name: name.to_owned(),
                baseline,
            }),
        }
    }
    Ok(specs)
}

/// Parses `NAME=UNIT` pairs; units may not be empty.
pub fn parse_units(pairs: &[String]) -> Result<Vec<(String, String)>, PlotError> {
    let mut units: Vec<(String, String)> = Vec::new();
    for pair in pairs {
        let (name, value) = split_pair(pair)?;
        let unit = match value {
            Some(v) if !v.is_empty() => v,
            _ => return Err(PlotError::EmptyUnit(name.to_owned())),
        };
        match units.iter_mut().find(|(n, _)| n == name) {
            Some((_, u)) => *u = unit.to_owned(),
            None => units.push((name.to_owned(), unit.to_owned())),
        }
    }
    Ok(units)
}

fn split_pair(pair: &str) -> Result<(&str, Option<&str>), PlotError> {
    let (name, value) = match pair.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (pair, None),
    };
    if name.is_empty() {
        return Err(PlotError::EmptyKey(pair.to_owned()));
    }
    Ok((name, value))
}

/// `strtobool` vocabulary: 1/y/yes/t/true/on and 0/n/no/f/false/off.
pub fn parse_bool(s: &str) -> Result<bool, PlotError> {
    match s.to_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(PlotError::InvalidBool(s.to_owned())),
    }
}

/// Output format for the rendered figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// Rasterised PNG.
    #[default]
    Agg,
    Svg,
}

impl FromStr for Backend {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agg" => Ok(Self::Agg),
            "svg" => Ok(Self::Svg),
            other => Err(PlotError::UnsupportedBackend(other.to_owned())),
        }
    }
}

/// When both axes select several columns their counts must match; a single
/// column on either side broadcasts against the other.
pub fn validate_axes(x: &[ColumnSpec], y: &[ColumnSpec]) -> Result<(), PlotError> {
    if x.len() > 1 && y.len() > 1 && x.len() != y.len() {
        return Err(PlotError::AxisCountMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    Ok(())
}

fn unit_of<'a>(units: &'a [(String, String)], name: &str) -> Option<&'a str> {
    units
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, u)| u.as_str())
}

/// All X columns must declare the same unit (or none).
pub fn check_unique_units(x: &[ColumnSpec], units: &[(String, String)]) -> Result<(), PlotError> {
    let distinct: Vec<String> = x
        .iter()
        .filter_map(|s| unit_of(units, &s.name))
        .unique()
        .map(str::to_owned)
        .collect();
    if distinct.len() > 1 {
        return Err(PlotError::InconsistentUnits(distinct));
    }
    Ok(())
}

/// Axis label: a single column yields `name` or `name (unit)`; several
/// columns yield their distinct units joined by ` / `, or an empty string
/// when no units were declared.
pub fn axis_label(specs: &[ColumnSpec], units: &[(String, String)]) -> String {
    if let [spec] = specs {
        return match unit_of(units, &spec.name) {
            Some(unit) => format!("{} ({unit})", spec.name),
            None => spec.name.clone(),
        };
    }
    specs
        .iter()
        .filter_map(|s| unit_of(units, &s.name))
        .unique()
        .join(" / ")
}

/// Merges the X and Y selections into one spec per distinct column; a later
/// flag for the same name wins, as the render uses one converted series per
/// column.
pub fn merge_specs(x: &[ColumnSpec], y: &[ColumnSpec]) -> Vec<ColumnSpec> {
    let mut merged: Vec<ColumnSpec> = Vec::new();
    for spec in x.iter().chain(y) {
        match merged.iter_mut().find(|m| m.name == spec.name) {
            Some(m) => m.baseline = spec.baseline,
            None => merged.push(spec.clone()),
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    pub name: String,
    pub values: Vec<f64>,
}

/// Reads the CSV (ignoring `#` comment lines before header detection) and
/// converts each selected column to floats, subtracting the first row's
/// value when the spec's baseline flag is set.
pub fn convert_input<R: Read>(input: R, specs: &[ColumnSpec]) -> Result<Vec<ColumnData>, PlotError> {
    let mut data = String::new();
    for line in BufReader::new(input).lines() {
        let line = line?;
        if !line.starts_with('#') {
            data.push_str(&line);
            data.push('\n');
        }
    }

    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();
    let indices = specs
        .iter()
        .map(|spec| {
            headers
                .iter()
                .position(|h| h == spec.name)
                .ok_or_else(|| PlotError::UnknownColumn(spec.name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns: Vec<ColumnData> = specs
        .iter()
        .map(|spec| ColumnData {
            name: spec.name.clone(),
            values: Vec::new(),
        })
        .collect();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        for (column, &ix) in columns.iter_mut().zip(&indices) {
            let raw = record.get(ix).ok_or_else(|| PlotError::MissingField {
                line: row + 2,
                column: column.name.clone(),
            })?;
            let value = raw.trim().parse().map_err(|_| PlotError::NotNumeric {
                column: column.name.clone(),
                value: raw.to_owned(),
            })?;
            column.values.push(value);
        }
    }
    for (column, spec) in columns.iter_mut().zip(specs) {
        if spec.baseline && !column.values.is_empty() {
            let base = column.values[0];
            for value in &mut column.values {
                *value -= base;
            }
        }
    }
    debug!(
        "converted {} columns, {} rows",
        columns.len(),
        columns.first().map(|c| c.values.len()).unwrap_or(0)
    );
    Ok(columns)
}

/// Pairs the X and Y selections into series, broadcasting the last column
/// of the shorter side.
pub fn pair_series(x: &[ColumnSpec], y: &[ColumnSpec]) -> Vec<(String, String)> {
    let count = x.len().max(y.len());
    (0..count)
        .map(|i| {
            (
                x[i.min(x.len() - 1)].name.clone(),
                y[i.min(y.len() - 1)].name.clone(),
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

fn column_values<'a>(columns: &'a [ColumnData], name: &str) -> Result<&'a [f64], PlotError> {
    columns
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.values.as_slice())
        .ok_or_else(|| PlotError::UnknownColumn(name.to_owned()))
}

/// Assembles one line series per (X, Y) pair in input order, legended as
/// `Y(X)`.
pub fn build_chart(
    title: &str,
    x: &[ColumnSpec],
    y: &[ColumnSpec],
    units: &[(String, String)],
    columns: &[ColumnData],
) -> Result<Chart, PlotError> {
    let mut series = Vec::new();
    for (x_name, y_name) in pair_series(x, y) {
        let xs = column_values(columns, &x_name)?;
        let ys = column_values(columns, &y_name)?;
        series.push(Series {
            label: format!("{y_name}({x_name})"),
            points: xs.iter().copied().zip(ys.iter().copied()).collect(),
        });
    }
    Ok(Chart {
        title: title.to_owned(),
        x_label: axis_label(x, units),
        y_label: axis_label(y, units),
        series,
    })
}

const PLOT_SIZE: (u32, u32) = (800, 600);

/// Renders the chart to `out` in the format selected by `backend`.
pub fn render(chart: &Chart, backend: Backend, out: &mut dyn Write) -> Result<()> {
    match backend {
        Backend::Agg => render_png(chart, out),
        Backend::Svg => render_svg(chart, out),
    }
}

fn render_png(chart: &Chart, out: &mut dyn Write) -> Result<()> {
    let (width, height) = PLOT_SIZE;
    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        draw(chart, &root)?;
        root.present()?;
    }
    PngEncoder::new(&mut *out).write_image(&buf, width, height, ExtendedColorType::Rgb8)?;
    out.flush()?;
    Ok(())
}

fn render_svg(chart: &Chart, out: &mut dyn Write) -> Result<()> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, PLOT_SIZE).into_drawing_area();
        draw(chart, &root)?;
        root.present()?;
    }
    out.write_all(svg.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn span<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if lo > hi {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

fn draw<DB>(chart: &Chart, root: &DrawingArea<DB, Shift>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (x_lo, x_hi) = span(
        chart
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|(x, _)| x)),
    );
    let (y_lo, y_hi) = span(
        chart
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|(_, y)| y)),
    );

    let mut cc = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
    cc.configure_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .light_line_style(TRANSPARENT)
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    for (i, series) in chart.series.iter().enumerate() {
        let style = Palette99::pick(i).to_rgba().stroke_width(2);
        cc.draw_series(LineSeries::new(series.points.iter().copied(), style))?
            .label(series.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], style));
    }
    cc.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.4))
        .draw()?;
    Ok(())
}
