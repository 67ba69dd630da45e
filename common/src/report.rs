use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sensor targets that may carry duplicate readings, together with the key
/// that identifies the physical device inside each sensor record. The device
/// key is never compared for duplicates.
pub const TARGETS: &[Target] = &[
    Target {
        name: "cpu",
        dev_key: "socket",
    },
    Target {
        name: "gpu",
        dev_key: "device",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub name: &'static str,
    pub dev_key: &'static str,
}

impl Target {
    pub fn by_name(name: &str) -> Option<&'static Target> {
        TARGETS.iter().find(|t| t.name == name)
    }
}

/// One sensor record: the device key mapped to a device identifier, plus
/// named data series (`package`, `cores`, `dram`, `board`, ...) mapped to
/// sample arrays. Series may be null or empty when a sensor location was
/// unavailable.
pub type SensorRecord = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Declared data series per target, used to auto-detect which targets
    /// report energy or power over time.
    pub format: BTreeMap<String, Vec<String>>,
    pub idle: Vec<Execution>,
    pub groups: Vec<Group>,
    /// Fields the filter does not touch (e.g. `units`), round-tripped as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub label: Option<String>,
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub label: Option<String>,
    pub executions: Vec<Execution>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One timed benchmark run: a shared timestamp series and per-target sensor
/// records whose series run parallel to `sample_times`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub sample_times: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Vec<SensorRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<Vec<SensorRecord>>,
    /// Fields like `range`, round-tripped as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Execution {
    pub fn records(&self, target: &str) -> Option<&[SensorRecord]> {
        match target {
            "cpu" => self.cpu.as_deref(),
            "gpu" => self.gpu.as_deref(),
            _ => None,
        }
    }

    pub fn records_mut(&mut self, target: &str) -> Option<&mut Vec<SensorRecord>> {
        match target {
            "cpu" => self.cpu.as_mut(),
            "gpu" => self.gpu.as_mut(),
            _ => None,
        }
    }
}
