use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{
    report::{Execution, Report, SensorRecord, TARGETS, Target},
    util::{diag, fmt_index_set, remove_indices},
};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("series '{series}' has {len} samples, expected {expected}")]
    LengthMismatch {
        series: String,
        len: usize,
        expected: usize,
    },
    #[error("invalid target '{0}'")]
    UnknownTarget(String),
}

/// Which sensor targets to consider for duplicate removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetMode {
    /// Inspect the report's `format` section: targets declaring an energy
    /// series are filtered, targets declaring power are filtered only when
    /// a time series accompanies them.
    #[default]
    Auto,
    All,
    Only(&'static Target),
}

impl TargetMode {
    pub fn from_name(name: &str) -> Result<Self, FilterError> {
        match name {
            "auto" => Ok(Self::Auto),
            "all" => Ok(Self::All),
            _ => Target::by_name(name)
                .map(Self::Only)
                .ok_or_else(|| FilterError::UnknownTarget(name.to_owned())),
        }
    }
}

/// Resolves the target mode against the report's declared `format` into the
/// concrete list of targets to filter.
pub fn active_targets(
    mode: TargetMode,
    format: &BTreeMap<String, Vec<String>>,
) -> Vec<&'static Target> {
    match mode {
        TargetMode::All => TARGETS.iter().collect(),
        TargetMode::Only(target) => vec![target],
        TargetMode::Auto => TARGETS
            .iter()
            .filter(|target| {
                format
                    .get(target.name)
                    .is_some_and(|series| wants_filtering(series))
            })
            .collect(),
    }
}

fn wants_filtering(series: &[String]) -> bool {
    if series.iter().any(|s| s.contains("energy")) {
        return true;
    }
    series.iter().any(|s| s.contains("power")) && series.iter().any(|s| s.contains("time"))
}

fn series_of<'a>(
    record: &'a SensorRecord,
    dev_key: &'a str,
) -> impl Iterator<Item = (&'a str, &'a Vec<Value>)> {
    record.iter().filter_map(move |(k, v)| match v {
        Value::Array(samples) if k != dev_key && !samples.is_empty() => {
            Some((k.as_str(), samples))
        }
        _ => None,
    })
}

/// Computes the union of removal candidates across every non-empty series of
/// every sensor record. A candidate is an index whose sample equals the
/// immediately preceding one. When a whole series past index 0 is constant,
/// `filter_all` also marks index 0; otherwise the last candidate is unmarked
/// so the first and last sample survive.
pub fn removal_set(
    records: &[SensorRecord],
    dev_key: &str,
    expected: usize,
    filter_all: bool,
) -> Result<BTreeSet<usize>, FilterError> {
    let mut remove = BTreeSet::new();
    for record in records {
        for (name, samples) in series_of(record, dev_key) {
            if samples.len() != expected {
                return Err(FilterError::LengthMismatch {
                    series: name.to_owned(),
                    len: samples.len(),
                    expected,
                });
            }
            let mut candidates: Vec<usize> = (1..samples.len())
                .filter(|&ix| samples[ix] == samples[ix - 1])
                .collect();
            if candidates.len() + 1 == samples.len() {
                if filter_all {
                    candidates.push(0);
                } else {
                    candidates.pop();
                }
            }
            remove.extend(candidates);
        }
    }
    Ok(remove)
}

fn apply_removal(
    records: &mut [SensorRecord],
    dev_key: &str,
    remove: &BTreeSet<usize>,
    expected: usize,
) -> Result<(), FilterError> {
    for record in records {
        for (name, value) in record.iter_mut() {
            let Value::Array(samples) = value else {
                continue;
            };
            if name == dev_key || samples.is_empty() {
                continue;
            }
            remove_indices(samples, remove);
            if samples.len() != expected {
                return Err(FilterError::LengthMismatch {
                    series: name.clone(),
                    len: samples.len(),
                    expected,
                });
            }
        }
    }
    Ok(())
}

/// Filters one execution in place, logging a `found:` line per scanned
/// target (with the running union of indices) and a `removed:` line per
/// target once the union has been excised from `sample_times` and every
/// parallel series.
pub fn filter_execution(
    execution: &mut Execution,
    filters: &[&'static Target],
    filter_all: bool,
    label: &str,
) -> Result<(), FilterError> {
    let expected = execution.sample_times.len();
    let mut remove = BTreeSet::new();
    let mut scanned = Vec::new();
    for target in filters {
        let Some(records) = execution.records(target.name) else {
            continue;
        };
        if records.is_empty() {
            continue;
        }
        remove.extend(removal_set(records, target.dev_key, expected, filter_all)?);
        diag(format!(
            "found:{label}:{}={}",
            target.name,
            fmt_index_set(&remove)
        ));
        scanned.push(*target);
    }
    if remove.is_empty() {
        return Ok(());
    }

    remove_indices(&mut execution.sample_times, &remove);
    let expected = execution.sample_times.len();
    for target in scanned {
        if let Some(records) = execution.records_mut(target.name) {
            apply_removal(records, target.dev_key, &remove, expected)?;
            diag(format!(
                "removed:{label}:{}={}",
                target.name,
                fmt_index_set(&remove)
            ));
        }
    }
    Ok(())
}

/// Filters every execution of the report in document order: the idle
/// measurements first, then each group's sections.
pub fn filter_report(
    report: &mut Report,
    mode: TargetMode,
    filter_all: bool,
) -> Result<(), FilterError> {
    let filters = active_targets(mode, &report.format);
    debug!(
        "filtering targets: {:?}",
        filters.iter().map(|t| t.name).collect::<Vec<_>>()
    );
    for execution in &mut report.idle {
        filter_execution(execution, &filters, filter_all, "idle")?;
    }
    for group in &mut report.groups {
        for section in &mut group.sections {
            for (idx, execution) in section.executions.iter_mut().enumerate() {
                let label = format!(
                    "{}:{}:{idx}",
                    group.label.as_deref().unwrap_or("null"),
                    section.label.as_deref().unwrap_or("null"),
                );
                filter_execution(execution, &filters, filter_all, &label)?;
            }
        }
    }
    Ok(())
}
