use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::model::{MeasurementRecord, RecordType, Value, LABEL_COLUMN};
use crate::pivot::label::label_key;
use crate::pivot::repeat::{detect_has_repeats, group_id, repeat_set_size};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How repeat-aware column naming is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatScope {
    /// One dataset-wide decision: a single label with in-set duplicate
    /// elements switches the entire output to `Element_N` naming.
    /// Matches the historical export format.
    Global,
    /// Each label group decides for itself; labels without duplicates
    /// keep bare element columns.
    PerLabel,
}

/// Pivot configuration. Stateless: pass it into [`pivot_records`] and hash
/// it into [`cache_key`] if the caller wants to memoize results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PivotOptions {
    pub repeat_scope: RepeatScope,
}

impl Default for PivotOptions {
    fn default() -> Self {
        PivotOptions {
            repeat_scope: RepeatScope::Global,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One wide row: a sample (or one repeat set of a sample).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    /// Label exactly as it appeared in the export; never suffixed here.
    pub sample_label: String,
    /// Ordinal of this row among rows sharing the label (0-based).
    /// Exporters may render it as a suffix; the engine keeps it separate.
    pub replicate: usize,
    /// Element column → value. Holds every column of the table,
    /// `Value::Missing` where the sample has no reading.
    pub cells: BTreeMap<String, Value>,
}

/// The assembled wide table. `columns` is the authoritative order and
/// always starts with [`LABEL_COLUMN`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideTable {
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl WideTable {
    fn empty() -> Self {
        WideTable {
            columns: vec![LABEL_COLUMN.to_string()],
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Cell lookup by row index and column name. The label column is
    /// answered from the row's label.
    pub fn value(&self, row: usize, column: &str) -> Option<Value> {
        let r = self.rows.get(row)?;
        if column == LABEL_COLUMN {
            return Some(Value::Text(r.sample_label.clone()));
        }
        r.cells.get(column).cloned()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Boundary validation failures. Heuristic fallbacks (degenerate GCD,
/// ragged groups) are policies, not errors, and never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PivotError {
    #[error("record {index}: empty sample label")]
    EmptyLabel { index: usize },
    #[error("record {index} ('{label}'): empty element name")]
    EmptyElement { index: usize, label: String },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Working representation of one output row while buckets are filled.
struct RowBucket {
    label: String,
    replicate: usize,
    min_seq: usize,
    /// Expected column count for a "complete" row (the label's set size).
    set_size: usize,
    /// Column name, value — in reading order, names suffixed later.
    cells: Vec<(String, Value)>,
}

/// How the authoritative element order is derived.
enum ColumnOrdering {
    /// From the first row carrying at least its label's set size of
    /// columns, sorted naturally; first row as fallback.
    FirstCompleteRow,
    /// Union of all columns, sorted naturally.
    Union,
}

/// Pivot long-format records into a wide per-sample table.
///
/// Only `Sample`-typed records participate; everything else is skipped.
/// Row order is the first-seen order of each (label, repeat-set) pair —
/// the output is never re-sorted by label. Empty input (or input with no
/// sample records) yields a table with the label column and no rows.
pub fn pivot_records(
    records: &[MeasurementRecord],
    options: &PivotOptions,
) -> Result<WideTable, PivotError> {
    // Validate at the boundary; past this point the engine never fails.
    for rec in records {
        if rec.sample_label.trim().is_empty() {
            return Err(PivotError::EmptyLabel {
                index: rec.sequence_index,
            });
        }
        if rec.element.trim().is_empty() {
            return Err(PivotError::EmptyElement {
                index: rec.sequence_index,
                label: rec.sample_label.clone(),
            });
        }
    }

    let samples: Vec<&MeasurementRecord> = records
        .iter()
        .filter(|r| r.record_type == RecordType::Sample)
        .collect();

    if samples.is_empty() {
        return Ok(WideTable::empty());
    }

    // Group by label, preserving first-seen label order.
    let mut by_label: Vec<(String, Vec<&MeasurementRecord>)> = Vec::new();
    let mut label_slot: HashMap<String, usize> = HashMap::new();
    for &rec in &samples {
        match label_slot.get(&rec.sample_label) {
            Some(&slot) => by_label[slot].1.push(rec),
            None => {
                label_slot.insert(rec.sample_label.clone(), by_label.len());
                by_label.push((rec.sample_label.clone(), vec![rec]));
            }
        }
    }

    let set_sizes: HashMap<String, usize> = by_label
        .iter()
        .map(|(label, group)| (label.clone(), repeat_set_size(group)))
        .collect();

    let global_repeats = detect_has_repeats(&samples, &set_sizes);
    debug!(
        "pivoting {} sample records, {} labels, repeats={global_repeats}",
        samples.len(),
        by_label.len()
    );

    let mut rows: Vec<RowBucket> = Vec::new();
    let mut any_repeat_aware = false;

    for (label, group) in &by_label {
        let set_size = set_sizes[label];
        let repeat_aware = match options.repeat_scope {
            RepeatScope::Global => global_repeats,
            RepeatScope::PerLabel => {
                let own = HashMap::from([(label.clone(), set_size)]);
                detect_has_repeats(group, &own)
            }
        };
        any_repeat_aware |= repeat_aware;

        if repeat_aware {
            rows.extend(build_repeat_rows(label, group, set_size));
        } else {
            rows.extend(build_occurrence_rows(label, group, set_size));
        }
    }

    rows.sort_by_key(|r| r.min_seq);

    let ordering = match options.repeat_scope {
        RepeatScope::Global if any_repeat_aware => ColumnOrdering::FirstCompleteRow,
        _ => ColumnOrdering::Union,
    };

    Ok(assemble(rows, ordering))
}

/// Repeat-aware rows: one per (label, group id), duplicate elements within
/// a group merged onto the row under `_1`, `_2`, ... column names.
fn build_repeat_rows(
    label: &str,
    group: &[&MeasurementRecord],
    set_size: usize,
) -> Vec<RowBucket> {
    let mut buckets: Vec<RowBucket> = Vec::new();

    for (pos, rec) in group.iter().enumerate() {
        let gid = group_id(pos, set_size);
        if gid == buckets.len() {
            buckets.push(RowBucket {
                label: label.to_string(),
                replicate: gid,
                min_seq: rec.sequence_index,
                set_size,
                cells: Vec::new(),
            });
        }
        let bucket = &mut buckets[gid];
        bucket.min_seq = bucket.min_seq.min(rec.sequence_index);
        bucket
            .cells
            .push((rec.base_element().to_string(), rec.value.clone()));
    }

    // Suffix only the elements that actually repeat within their bucket.
    for bucket in &mut buckets {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for (name, _) in &bucket.cells {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        let mut occurrence: HashMap<String, usize> = HashMap::new();
        for (name, _) in &mut bucket.cells {
            if counts[name.as_str()] > 1 {
                let n = occurrence.entry(name.clone()).or_insert(0);
                *n += 1;
                let suffixed = format!("{}_{}", name, n);
                *name = suffixed;
            }
        }
    }

    buckets
}

/// Occurrence rows: the n-th reading of an element under a label lands in
/// the n-th row for that label. Column names stay bare.
fn build_occurrence_rows(
    label: &str,
    group: &[&MeasurementRecord],
    set_size: usize,
) -> Vec<RowBucket> {
    let mut next_uid: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<RowBucket> = Vec::new();

    for rec in group {
        let slot = next_uid.entry(rec.base_element().to_string()).or_insert(0);
        let uid = *slot;
        *slot += 1;

        if uid == buckets.len() {
            buckets.push(RowBucket {
                label: label.to_string(),
                replicate: uid,
                min_seq: rec.sequence_index,
                set_size,
                cells: Vec::new(),
            });
        }
        let bucket = &mut buckets[uid];
        bucket.min_seq = bucket.min_seq.min(rec.sequence_index);
        bucket
            .cells
            .push((rec.base_element().to_string(), rec.value.clone()));
    }

    buckets
}

/// Build the final table: authoritative column order, label column first,
/// unexpected columns appended at the end, every row carrying the full
/// column set with `Missing` holes.
fn assemble(rows: Vec<RowBucket>, ordering: ColumnOrdering) -> WideTable {
    let mut element_order: Vec<String> = match ordering {
        ColumnOrdering::FirstCompleteRow => {
            let chosen = rows
                .iter()
                .find(|r| r.cells.len() >= r.set_size)
                .or_else(|| rows.first());
            let mut cols: Vec<String> = chosen
                .map(|r| r.cells.iter().map(|(name, _)| name.clone()).collect())
                .unwrap_or_default();
            cols.sort_by(|a, b| label_key(a).cmp(&label_key(b)));
            cols
        }
        ColumnOrdering::Union => {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut cols: Vec<String> = Vec::new();
            for row in &rows {
                for (name, _) in &row.cells {
                    if seen.insert(name) {
                        cols.push(name.clone());
                    }
                }
            }
            cols.sort_by(|a, b| label_key(a).cmp(&label_key(b)));
            cols
        }
    };

    // Columns observed in rows but absent from the derived order go last.
    // Not expected in normal operation.
    let mut known: HashSet<String> = element_order.iter().cloned().collect();
    for row in &rows {
        for (name, _) in &row.cells {
            if known.insert(name.clone()) {
                element_order.push(name.clone());
            }
        }
    }

    let mut columns = Vec::with_capacity(element_order.len() + 1);
    columns.push(LABEL_COLUMN.to_string());
    columns.extend(element_order.iter().cloned());

    let out_rows: Vec<PivotRow> = rows
        .into_iter()
        .map(|bucket| {
            let mut cells: BTreeMap<String, Value> = element_order
                .iter()
                .map(|c| (c.clone(), Value::Missing))
                .collect();
            for (name, value) in bucket.cells {
                cells.insert(name, value);
            }
            PivotRow {
                sample_label: bucket.label,
                replicate: bucket.replicate,
                cells,
            }
        })
        .collect();

    WideTable {
        columns,
        rows: out_rows,
    }
}

/// Explicit memoization key over input and configuration. The engine is
/// stateless; callers that want to skip recomputation on unchanged data
/// own the cache and key it on this.
pub fn cache_key(records: &[MeasurementRecord], options: &PivotOptions) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    records.hash(&mut hasher);
    options.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(seq: usize, label: &str, element: &str, value: f64) -> MeasurementRecord {
        MeasurementRecord {
            sample_label: label.to_string(),
            element: element.to_string(),
            value: Value::Number(value),
            record_type: RecordType::Sample,
            sequence_index: seq,
        }
    }

    fn num(table: &WideTable, row: usize, col: &str) -> Option<f64> {
        table.value(row, col).and_then(|v| v.as_f64())
    }

    /// 6 records, label S1, elements A,B,C twice: grouped by position
    /// into two rows, not by value.
    #[test]
    fn repeated_panel_splits_into_two_rows() {
        let records = vec![
            rec(0, "S1", "A", 10.0),
            rec(1, "S1", "B", 20.0),
            rec(2, "S1", "C", 30.0),
            rec(3, "S1", "A", 11.0),
            rec(4, "S1", "B", 21.0),
            rec(5, "S1", "C", 31.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns, vec![LABEL_COLUMN, "A", "B", "C"]);
        assert_eq!(num(&table, 0, "A"), Some(10.0));
        assert_eq!(num(&table, 0, "B"), Some(20.0));
        assert_eq!(num(&table, 0, "C"), Some(30.0));
        assert_eq!(num(&table, 1, "A"), Some(11.0));
        assert_eq!(num(&table, 1, "B"), Some(21.0));
        assert_eq!(num(&table, 1, "C"), Some(31.0));
        assert_eq!(table.rows[0].sample_label, "S1");
        assert_eq!(table.rows[1].sample_label, "S1");
        assert_eq!(table.rows[1].replicate, 1);
    }

    /// An element read three times at different points in the run, with
    /// nothing else under the label, gives three single-column rows.
    #[test]
    fn lone_element_readings_become_separate_rows() {
        let records = vec![
            rec(0, "S1", "Fe", 1.0),
            rec(1, "S1", "Fe", 2.0),
            rec(2, "S1", "Fe", 3.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.columns, vec![LABEL_COLUMN, "Fe"]);
        for (i, expected) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            assert_eq!(num(&table, i, "Fe"), Some(expected));
            assert_eq!(table.rows[i].replicate, i);
        }
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = pivot_records(&[], &PivotOptions::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns, vec![LABEL_COLUMN]);
    }

    #[test]
    fn non_sample_records_are_excluded() {
        let mut blank = rec(0, "Cal Blank", "Fe", 0.001);
        blank.record_type = RecordType::Blank;
        let records = vec![blank, rec(1, "S1", "Fe", 5.0)];

        let table = pivot_records(&records, &PivotOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].sample_label, "S1");
    }

    /// Duplicate elements inside one set merge onto a single row under
    /// suffixed columns, including explicit wavelength suffixes.
    #[test]
    fn in_set_duplicates_merge_with_suffixed_columns() {
        let records = vec![
            rec(0, "S1", "Fe", 1.0),
            rec(1, "S1", "Fe_2", 1.1),
            rec(2, "S1", "Na", 4.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.columns, vec![LABEL_COLUMN, "Fe_1", "Fe_2", "Na"]);
        assert_eq!(num(&table, 0, "Fe_1"), Some(1.0));
        assert_eq!(num(&table, 0, "Fe_2"), Some(1.1));
        assert_eq!(num(&table, 0, "Na"), Some(4.0));
    }

    /// One label with true duplicates forces suffixed naming on every
    /// label under the global scope, but not under per-label scope.
    #[test]
    fn repeat_scope_controls_naming_blast_radius() {
        let records = vec![
            rec(0, "S1", "Fe", 1.0),
            rec(1, "S1", "Fe", 1.1),
            rec(2, "S1", "Cu", 2.0),
            rec(3, "S2", "Fe", 9.0),
            rec(4, "S2", "Cu", 8.0),
        ];

        let global = pivot_records(&records, &PivotOptions::default()).unwrap();
        // S2's Fe reading also lands under a bare name or a suffixed one
        // depending on its own group's shape; under Global the *branch*
        // is repeat-aware for both labels, and S2 has no duplicates so
        // its columns stay bare.
        assert!(global.columns.contains(&"Fe_1".to_string()));
        assert!(global.columns.contains(&"Fe_2".to_string()));
        assert!(global.columns.contains(&"Fe".to_string()));
        let s2 = global.rows.iter().position(|r| r.sample_label == "S2").unwrap();
        assert_eq!(num(&global, s2, "Fe"), Some(9.0));

        let per_label = pivot_records(
            &records,
            &PivotOptions {
                repeat_scope: RepeatScope::PerLabel,
            },
        )
        .unwrap();
        assert_eq!(per_label.len(), 2);
        let s2 = per_label
            .rows
            .iter()
            .position(|r| r.sample_label == "S2")
            .unwrap();
        assert_eq!(num(&per_label, s2, "Fe"), Some(9.0));
        assert_eq!(num(&per_label, s2, "Cu"), Some(8.0));
    }

    /// Rows come out in first-seen input order, never sorted by label.
    #[test]
    fn row_order_follows_input_not_labels() {
        let records = vec![
            rec(0, "Zn-500", "Fe", 1.0),
            rec(1, "Alpha", "Fe", 2.0),
            rec(2, "M-7", "Fe", 3.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();
        let labels: Vec<&str> = table
            .rows
            .iter()
            .map(|r| r.sample_label.as_str())
            .collect();
        assert_eq!(labels, vec!["Zn-500", "Alpha", "M-7"]);
    }

    /// Shuffling the input and restoring the original order reproduces
    /// identical output.
    #[test]
    fn order_restoration_is_lossless() {
        let records = vec![
            rec(0, "S3", "Fe", 1.0),
            rec(1, "S3", "Cu", 2.0),
            rec(2, "S1", "Fe", 3.0),
            rec(3, "S1", "Cu", 4.0),
            rec(4, "S2", "Fe", 5.0),
        ];
        let baseline = pivot_records(&records, &PivotOptions::default()).unwrap();

        let mut shuffled = records.clone();
        shuffled.swap(0, 4);
        shuffled.swap(1, 3);
        shuffled.sort_by_key(|r| r.sequence_index);

        let restored = pivot_records(&shuffled, &PivotOptions::default()).unwrap();
        assert_eq!(baseline, restored);
    }

    /// Every row carries the full column set; gaps are explicit Missing.
    #[test]
    fn missing_readings_are_explicit() {
        let records = vec![
            rec(0, "S1", "Fe", 1.0),
            rec(1, "S1", "Cu", 2.0),
            rec(2, "S2", "Fe", 3.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();

        for row in &table.rows {
            for col in &table.columns[1..] {
                assert!(row.cells.contains_key(col));
            }
        }
        let s2 = table.rows.iter().position(|r| r.sample_label == "S2").unwrap();
        assert_eq!(table.value(s2, "Cu"), Some(Value::Missing));
    }

    /// Pivoting an already-wide table (one reading per label/element) is
    /// a no-op.
    #[test]
    fn pivot_is_idempotent_on_wide_data() {
        let records = vec![
            rec(0, "S1", "A", 10.0),
            rec(1, "S1", "B", 20.0),
            rec(2, "S1", "C", 30.0),
            rec(3, "S2", "A", 11.0),
            rec(4, "S2", "B", 21.0),
            rec(5, "S2", "C", 31.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();

        // Re-expand the wide rows into records, row by row.
        let mut seq = 0;
        let mut re_expanded = Vec::new();
        for row in &table.rows {
            for col in &table.columns[1..] {
                re_expanded.push(MeasurementRecord {
                    sample_label: row.sample_label.clone(),
                    element: col.clone(),
                    value: row.cells[col].clone(),
                    record_type: RecordType::Sample,
                    sequence_index: seq,
                });
                seq += 1;
            }
        }

        let again = pivot_records(&re_expanded, &PivotOptions::default()).unwrap();
        assert_eq!(table, again);
    }

    #[test]
    fn number_of_rows_matches_distinct_group_keys() {
        // 2 labels, one with a doubled panel: 2 + 1 = 3 groups
        let records = vec![
            rec(0, "S1", "A", 1.0),
            rec(1, "S1", "B", 2.0),
            rec(2, "S1", "A", 3.0),
            rec(3, "S1", "B", 4.0),
            rec(4, "S2", "A", 5.0),
        ];
        let table = pivot_records(&records, &PivotOptions::default()).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn validation_rejects_blank_fields() {
        let bad_label = vec![rec(7, "  ", "Fe", 1.0)];
        assert_eq!(
            pivot_records(&bad_label, &PivotOptions::default()),
            Err(PivotError::EmptyLabel { index: 7 })
        );

        let bad_element = vec![rec(3, "S1", "", 1.0)];
        assert!(matches!(
            pivot_records(&bad_element, &PivotOptions::default()),
            Err(PivotError::EmptyElement { index: 3, .. })
        ));
    }

    #[test]
    fn cache_key_tracks_input_and_options() {
        let records = vec![rec(0, "S1", "Fe", 1.0)];
        let a = cache_key(&records, &PivotOptions::default());
        let b = cache_key(&records, &PivotOptions::default());
        assert_eq!(a, b);

        let per_label = PivotOptions {
            repeat_scope: RepeatScope::PerLabel,
        };
        assert_ne!(a, cache_key(&records, &per_label));

        let mut changed = records.clone();
        changed[0].value = Value::Number(2.0);
        assert_ne!(a, cache_key(&changed, &PivotOptions::default()));
    }
}
