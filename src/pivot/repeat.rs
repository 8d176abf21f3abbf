use std::collections::HashMap;

use log::debug;

use crate::data::model::MeasurementRecord;

// ---------------------------------------------------------------------------
// Repeat-set detection
// ---------------------------------------------------------------------------
//
// A lab that re-runs a sample's full element panel N times produces N
// consecutive blocks of readings under one label. Every element's
// occurrence count is then divisible by N, so the GCD of the counts
// recovers N without any explicit replicate marker in the export.
// The heuristic only fires when the divisibility is exact; anything
// ragged falls back to "one set".

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Number of records that make up one logical repeat of this label's
/// element panel.
///
/// `records` must all share one sample label. Returns 1 for an empty
/// group; returns the whole group size when no repeat structure is
/// detected.
pub fn repeat_set_size(records: &[&MeasurementRecord]) -> usize {
    if records.is_empty() {
        return 1;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for rec in records {
        *counts.entry(rec.base_element()).or_insert(0) += 1;
    }

    let total = records.len();
    let g = counts.values().fold(0usize, |acc, &c| gcd(acc, c));

    if g > 1 && total % g == 0 {
        total / g
    } else {
        debug!(
            "no repeat structure for '{}' (gcd {g}, {total} records), treating as one set",
            records[0].sample_label
        );
        total
    }
}

/// Index of the repeat set a record at `position` (ordinal within its
/// label group) belongs to.
///
/// Chunking is always by `set_size` directly: `position / set_size`.
/// Deriving a secondary "rows per set" quantity and slicing by that is
/// wrong whenever it differs from `set_size` (6 records with set size 3
/// must give two chunks of three, not three chunks of two).
pub fn group_id(position: usize, set_size: usize) -> usize {
    position / set_size.max(1)
}

/// Split the ordinals `0..len` into repeat-set chunks of `set_size`.
/// The last chunk may be short if the group is ragged.
pub fn chunk_by_set_size(len: usize, set_size: usize) -> Vec<std::ops::Range<usize>> {
    let step = set_size.max(1);
    (0..len)
        .step_by(step)
        .map(|start| start..(start + step).min(len))
        .collect()
}

/// Whether any `(label, group_id, base element)` key occurs more than
/// once across the whole dataset.
///
/// `set_sizes` maps each label to its repeat set size. The answer is a
/// single dataset-wide boolean: one label with true in-set duplicates
/// switches the entire output to repeat-aware column naming.
pub fn detect_has_repeats(
    records: &[&MeasurementRecord],
    set_sizes: &HashMap<String, usize>,
) -> bool {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut seen: HashMap<(String, usize, String), usize> = HashMap::new();

    for rec in records {
        let pos = positions.entry(rec.sample_label.as_str()).or_insert(0);
        let set_size = set_sizes
            .get(rec.sample_label.as_str())
            .copied()
            .unwrap_or(1);
        let gid = group_id(*pos, set_size);
        *pos += 1;

        let key = (
            rec.sample_label.clone(),
            gid,
            rec.base_element().to_string(),
        );
        let n = seen.entry(key).or_insert(0);
        *n += 1;
        if *n > 1 {
            return true;
        }
    }
    false
}
