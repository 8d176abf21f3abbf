//! Long-to-wide pivot engine for ICP-OES/MS instrument exports.
//!
//! Instruments write one row per reading (Solution Label × Element ×
//! concentration); reporting wants one row per sample with one column per
//! element. The catch is repeated readings: a re-run element panel should
//! become extra rows, repeated wavelengths of one element should merge
//! onto one row under `Element_1`, `Element_2`, ... columns. The
//! [`pivot`] module resolves that ambiguity with a GCD-based repeat-set
//! heuristic; [`data`] loads and filters the long exports, [`export`]
//! writes the wide result back out.

pub mod data;
pub mod export;
pub mod pivot;

pub use data::model::{MeasurementRecord, RecordType, RunData, Value, LABEL_COLUMN};
pub use pivot::engine::{
    cache_key, pivot_records, PivotError, PivotOptions, PivotRow, RepeatScope, WideTable,
};
