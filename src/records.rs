use crate::fields::{SourceRow, resolve_field, resolve_text};
use crate::timestamp::decompose_value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "time", "datetime", "date_time", "date"];

pub const FAULT_TYPE_ALIASES: &[&str] =
    &["fault_type", "fault type", "fault", "faulttype", "fault-type"];

/// A canonical measurement column and the spellings accepted for it
#[derive(Clone, Copy, Debug)]
pub struct ValueField {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

const THERMAL_FIELDS: &[ValueField] = &[ValueField {
    name: "temperature",
    aliases: &["temperature", "temp", "temp_c", "temperature_c", "temperature (c)"],
}];

const ACOUSTIC_FIELDS: &[ValueField] = &[ValueField {
    name: "acoustic_level",
    aliases: &[
        "acoustic_level",
        "acoustic level",
        "level",
        "acoustic",
        "acoustic_level_db",
        "level_db",
    ],
}];

const VIBRATION_FIELDS: &[ValueField] = &[
    ValueField {
        name: "vibration_x",
        aliases: &["vibration_x", "vibration x", "vibrationx", "vib_x", "vibx", "x"],
    },
    ValueField {
        name: "vibration_y",
        aliases: &["vibration_y", "vibration y", "vibrationy", "vib_y", "viby", "y"],
    },
    ValueField {
        name: "vibration_z",
        aliases: &["vibration_z", "vibration z", "vibrationz", "vib_z", "vibz", "z"],
    },
];

/// The logical data sources, one spreadsheet tab each
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorCategory {
    Thermal,
    Acoustic,
    Vibration,
}

impl SensorCategory {
    pub const ALL: [SensorCategory; 3] = [
        SensorCategory::Thermal,
        SensorCategory::Acoustic,
        SensorCategory::Vibration,
    ];

    /// Accepts the upload form codes (`THERMAL`) as well as tab-style names
    /// (`Thermal Data`), ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let name = name.strip_suffix(" data").unwrap_or(&name);
        match name {
            "thermal" => Some(SensorCategory::Thermal),
            "acoustic" => Some(SensorCategory::Acoustic),
            "vibration" => Some(SensorCategory::Vibration),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SensorCategory::Thermal => "THERMAL",
            SensorCategory::Acoustic => "ACOUSTIC",
            SensorCategory::Vibration => "VIBRATION",
        }
    }

    /// Human-facing name, also the default tab name
    pub fn label(self) -> &'static str {
        match self {
            SensorCategory::Thermal => "Thermal Data",
            SensorCategory::Acoustic => "Acoustic Data",
            SensorCategory::Vibration => "Vibration Data",
        }
    }

    pub fn value_fields(self) -> &'static [ValueField] {
        match self {
            SensorCategory::Thermal => THERMAL_FIELDS,
            SensorCategory::Acoustic => ACOUSTIC_FIELDS,
            SensorCategory::Vibration => VIBRATION_FIELDS,
        }
    }
}

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A spreadsheet row reduced to the dashboard's canonical fields
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub category: SensorCategory,
    /// `"<tab>#<row index>"`
    pub id: String,
    /// `"<date> / <time>"`
    pub timestamp: String,
    pub ts_date: String,
    pub ts_time: String,
    pub fault_type: String,
    #[serde(flatten)]
    pub values: Map<String, Value>,
    pub raw: SourceRow,
}

/// Resolve timestamp, fault type and the category's measurement columns
/// for one row
pub fn normalize_row(category: SensorCategory, index: usize, row: &SourceRow) -> NormalizedRecord {
    let parts = decompose_value(&resolve_field(row, TIMESTAMP_ALIASES));
    let values = category
        .value_fields()
        .iter()
        .map(|field| (field.name.to_string(), resolve_field(row, field.aliases)))
        .collect();

    NormalizedRecord {
        category,
        id: format!("{}#{}", category.label(), index),
        timestamp: parts.combined(),
        ts_date: parts.date,
        ts_time: parts.time,
        fault_type: resolve_text(row, FAULT_TYPE_ALIASES),
        values,
        raw: row.clone(),
    }
}

pub fn normalize_rows(category: SensorCategory, rows: &[SourceRow]) -> Vec<NormalizedRecord> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| normalize_row(category, idx, row))
        .collect()
}

/// Readings from every category that share one timestamp
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MergedRecord {
    pub timestamp: String,
    #[serde(flatten)]
    pub values: Map<String, Value>,
    pub fault_type: String,
}

/// Merge records across categories by their combined timestamp
///
/// Output is in order of first appearance. Later records overwrite the
/// measurement values they carry; the fault type is only replaced by a
/// non-empty one.
pub fn merge_by_timestamp(records: &[NormalizedRecord]) -> Vec<MergedRecord> {
    let mut merged: Vec<MergedRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let slot = *index.entry(record.timestamp.clone()).or_insert_with(|| {
            merged.push(MergedRecord {
                timestamp: record.timestamp.clone(),
                ..MergedRecord::default()
            });
            merged.len() - 1
        });
        let entry = &mut merged[slot];
        for (name, value) in &record.values {
            entry.values.insert(name.clone(), value.clone());
        }
        if !record.fault_type.is_empty() {
            entry.fault_type = record.fault_type.clone();
        }
    }

    merged
}

/// Per-category tally of recognised fault types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FaultCounts {
    #[serde(rename = "Imbalance")]
    pub imbalance: usize,
    #[serde(rename = "Bearing Fault")]
    pub bearing_fault: usize,
    #[serde(rename = "Overheating")]
    pub overheating: usize,
    #[serde(rename = "Normal")]
    pub normal: usize,
}

impl FaultCounts {
    /// Counts one fault label. Matching is a case-insensitive substring test
    /// in the order imbalance, bearing, overheat, normal; anything else is
    /// ignored.
    pub fn record(&mut self, fault_type: &str) {
        let fault = fault_type.to_lowercase();
        if fault.is_empty() {
            return;
        }
        if fault.contains("imbalance") {
            self.imbalance += 1;
        } else if fault.contains("bearing") {
            self.bearing_fault += 1;
        } else if fault.contains("overheat") {
            self.overheating += 1;
        } else if fault.contains("normal") {
            self.normal += 1;
        }
    }
}

pub fn fault_counts(records: &[NormalizedRecord]) -> BTreeMap<SensorCategory, FaultCounts> {
    let mut counts: BTreeMap<SensorCategory, FaultCounts> = SensorCategory::ALL
        .iter()
        .map(|c| (*c, FaultCounts::default()))
        .collect();
    for record in records {
        counts
            .entry(record.category)
            .or_default()
            .record(&record.fault_type);
    }
    counts
}
