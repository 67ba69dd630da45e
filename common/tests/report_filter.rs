use common::{
    filter::{TargetMode, filter_report},
    report::Report,
};
use serde_json::json;

fn sample_report() -> Report {
    serde_json::from_value(json!({
        "units": { "time": "ns", "energy": "J", "power": "W" },
        "format": {
            "cpu": ["sample_time", "energy"],
            "gpu": ["sample_time", "power"]
        },
        "idle": [{
            "range": { "start": "main", "end": "main" },
            "sample_times": [100, 200, 300, 400],
            "cpu": [
                { "socket": 0, "package": [1.0, 1.0, 2.0, 3.0], "dram": [0.5, 0.6, 0.7, 0.8] },
                { "socket": 1, "package": [2.0, 2.5, 3.0, 3.5], "dram": null }
            ]
        }],
        "groups": [{
            "label": "g1",
            "extra": null,
            "sections": [{
                "label": "s1",
                "extra": null,
                "executions": [
                    {
                        "sample_times": [10, 20, 30],
                        "cpu": [{ "socket": 0, "package": [5.0, 5.0, 5.0] }],
                        "gpu": [{ "device": 0, "board": [7.0, 7.5, 8.0] }]
                    },
                    {
                        "sample_times": [40, 50],
                        "cpu": [{ "socket": 0, "package": [9.0, 9.5] }]
                    }
                ]
            }]
        }]
    }))
    .unwrap()
}

fn assert_aligned(report: &Report) {
    let executions = report.idle.iter().chain(
        report
            .groups
            .iter()
            .flat_map(|g| g.sections.iter().flat_map(|s| s.executions.iter())),
    );
    for execution in executions {
        for target in ["cpu", "gpu"] {
            let Some(records) = execution.records(target) else {
                continue;
            };
            for record in records {
                for (key, value) in record {
                    let Some(samples) = value.as_array() else {
                        continue;
                    };
                    if key == "socket" || key == "device" || samples.is_empty() {
                        continue;
                    }
                    assert_eq!(
                        samples.len(),
                        execution.sample_times.len(),
                        "series '{key}' out of step"
                    );
                }
            }
        }
    }
}

#[test]
fn auto_filter_prunes_duplicates_and_keeps_series_aligned() {
    let mut report = sample_report();
    filter_report(&mut report, TargetMode::Auto, false).unwrap();

    // idle: socket 0 package has one adjacent duplicate at index 1
    assert_eq!(report.idle[0].sample_times, vec![json!(100), json!(300), json!(400)]);
    assert_aligned(&report);

    // constant series keeps its first and last sample
    let exec = &report.groups[0].sections[0].executions[0];
    assert_eq!(exec.sample_times, vec![json!(10), json!(30)]);
    assert_eq!(exec.cpu.as_ref().unwrap()[0]["package"], json!([5.0, 5.0]));
    assert_eq!(exec.gpu.as_ref().unwrap()[0]["board"], json!([7.0, 8.0]));

    // nothing to remove in the second execution
    let exec = &report.groups[0].sections[0].executions[1];
    assert_eq!(exec.sample_times, vec![json!(40), json!(50)]);
}

#[test]
fn filter_all_collapses_constant_series() {
    let mut report = sample_report();
    filter_report(&mut report, TargetMode::All, true).unwrap();

    let exec = &report.groups[0].sections[0].executions[0];
    assert!(exec.sample_times.is_empty());
    assert_eq!(exec.cpu.as_ref().unwrap()[0]["package"], json!([]));
    assert_eq!(exec.gpu.as_ref().unwrap()[0]["board"], json!([]));
    assert_aligned(&report);
}

#[test]
fn filtering_reaches_a_fixed_point_after_one_pass() {
    let mut report = sample_report();
    filter_report(&mut report, TargetMode::All, false).unwrap();
    let once = serde_json::to_value(&report).unwrap();
    filter_report(&mut report, TargetMode::All, false).unwrap();
    assert_eq!(serde_json::to_value(&report).unwrap(), once);
}

#[test]
fn untouched_fields_survive_the_round_trip() {
    let mut report = sample_report();
    filter_report(&mut report, TargetMode::Auto, false).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["units"]["energy"], json!("J"));
    assert_eq!(value["idle"][0]["range"]["start"], json!("main"));
    assert_eq!(value["groups"][0]["label"], json!("g1"));
}

#[test]
fn mismatched_series_length_is_fatal() {
    let mut report: Report = serde_json::from_value(json!({
        "format": { "cpu": ["energy"] },
        "idle": [{
            "sample_times": [1, 2, 3],
            "cpu": [{ "socket": 0, "package": [1.0, 2.0] }]
        }],
        "groups": []
    }))
    .unwrap();
    assert!(filter_report(&mut report, TargetMode::Auto, false).is_err());
}
