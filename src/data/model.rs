use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Column name used for the sample identifier in wide output.
/// Matches the header the instrument software writes in its long exports.
pub const LABEL_COLUMN: &str = "Solution Label";

// ---------------------------------------------------------------------------
// Value – a single measured cell
// ---------------------------------------------------------------------------

/// A measurement cell. Malformed or absent readings are carried as
/// `Missing` all the way through to the output, never dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    /// Non-numeric text the instrument occasionally emits in a value slot
    /// (e.g. `"OVERRANGE"`). Preserved verbatim.
    Text(String),
    Missing,
}

// -- Manual Eq/Hash so records can feed a memoization hash --

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Number(v) => v.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Missing => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => Ok(()),
        }
    }
}

impl Value {
    /// Try to interpret the cell as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Parse a raw text cell: empty → `Missing`, numeric → `Number`,
    /// anything else kept as `Text`.
    pub fn parse(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Number(v),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

// ---------------------------------------------------------------------------
// RecordType – what kind of solution a record was measured from
// ---------------------------------------------------------------------------

/// Solution type as reported by the instrument. Only `Sample` records
/// participate in pivoting; the rest feed the QC/check layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    Sample,
    Blank,
    Standard,
    Other(String),
}

impl RecordType {
    /// Parse the type strings instrument exports actually contain
    /// (`Samp`, `Blk`, `CalStd`, ...).
    pub fn parse(raw: &str) -> RecordType {
        match raw.trim().to_ascii_lowercase().as_str() {
            "samp" | "sample" => RecordType::Sample,
            "blk" | "blank" | "cal blank" | "calblk" => RecordType::Blank,
            "std" | "calstd" | "standard" | "cal std" => RecordType::Standard,
            _ => RecordType::Other(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Sample => write!(f, "Samp"),
            RecordType::Blank => write!(f, "Blk"),
            RecordType::Standard => write!(f, "Std"),
            RecordType::Other(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MeasurementRecord – one row of the long-format export
// ---------------------------------------------------------------------------

/// A single instrument reading (one row of the long-format export).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Free-text sample identifier; repeats across replicate analyses.
    pub sample_label: String,
    /// Analyte name, possibly carrying a `_N` wavelength suffix (`"Fe_2"`).
    pub element: String,
    pub value: Value,
    pub record_type: RecordType,
    /// Position in the original export. Output row order is derived from
    /// this, never from sorting labels.
    pub sequence_index: usize,
}

impl MeasurementRecord {
    /// The element with any trailing `_<digits>` wavelength suffix removed:
    /// `"Fe_2"` → `"Fe"`. Grouping always works on the base element.
    pub fn base_element(&self) -> &str {
        base_element(&self.element)
    }
}

/// Strip a trailing `_<digits>` suffix from an element name.
pub fn base_element(element: &str) -> &str {
    match element.rsplit_once('_') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => element,
    }
}

// ---------------------------------------------------------------------------
// RunData – the complete loaded run
// ---------------------------------------------------------------------------

/// The full parsed run with pre-computed facet indexes.
#[derive(Debug, Clone)]
pub struct RunData {
    /// All readings, in export order.
    pub records: Vec<MeasurementRecord>,
    /// Distinct sample labels in first-seen order.
    pub labels: Vec<String>,
    /// Distinct base element names, sorted.
    pub elements: BTreeSet<String>,
    /// Distinct record types observed.
    pub record_types: BTreeSet<RecordType>,
}

impl RunData {
    /// Build facet indexes from loaded records. `sequence_index` is
    /// (re)assigned from position so downstream ordering is self-consistent
    /// even if the loader was fed pre-sliced data.
    pub fn from_records(mut records: Vec<MeasurementRecord>) -> Self {
        let mut labels: Vec<String> = Vec::new();
        let mut seen_labels: BTreeSet<String> = BTreeSet::new();
        let mut elements: BTreeSet<String> = BTreeSet::new();
        let mut record_types: BTreeSet<RecordType> = BTreeSet::new();

        for (i, rec) in records.iter_mut().enumerate() {
            rec.sequence_index = i;
            if seen_labels.insert(rec.sample_label.clone()) {
                labels.push(rec.sample_label.clone());
            }
            elements.insert(rec.base_element().to_string());
            record_types.insert(rec.record_type.clone());
        }

        RunData {
            records,
            labels,
            elements,
            record_types,
        }
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the run is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
