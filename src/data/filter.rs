use std::collections::BTreeSet;

use super::model::{RecordType, RunData};

// ---------------------------------------------------------------------------
// Facet filter: which record types / labels / elements are selected
// ---------------------------------------------------------------------------

/// Per-facet selection state for the display/export layer that sits in
/// front of the pivot. Semantics per facet:
/// * all values selected → no constraint
/// * empty set → nothing selected → nothing passes
/// * otherwise → record passes if its value is in the set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub record_types: BTreeSet<RecordType>,
    pub labels: BTreeSet<String>,
    pub elements: BTreeSet<String>,
}

/// Initialise a [`FilterState`] with everything selected (show all).
pub fn init_filter_state(run: &RunData) -> FilterState {
    FilterState {
        record_types: run.record_types.clone(),
        labels: run.labels.iter().cloned().collect(),
        elements: run.elements.clone(),
    }
}

/// A filter that keeps only sample records, with all labels and elements
/// selected. This is the state the pivot view starts from.
pub fn samples_only(run: &RunData) -> FilterState {
    let mut state = init_filter_state(run);
    state.record_types = BTreeSet::from([RecordType::Sample]);
    state
}

/// Return indices of records that pass all active facets.
pub fn filtered_indices(run: &RunData, filters: &FilterState) -> Vec<usize> {
    run.records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            facet_passes(&filters.record_types, &run.record_types, &rec.record_type)
                && label_passes(filters, run, &rec.sample_label)
                && facet_passes(
                    &filters.elements,
                    &run.elements,
                    &rec.base_element().to_string(),
                )
        })
        .map(|(i, _)| i)
        .collect()
}

fn facet_passes<T: Ord>(selected: &BTreeSet<T>, all: &BTreeSet<T>, value: &T) -> bool {
    if selected.is_empty() {
        return false;
    }
    // Everything selected → no effective filter.
    if selected.len() == all.len() {
        return true;
    }
    selected.contains(value)
}

fn label_passes(filters: &FilterState, run: &RunData, label: &str) -> bool {
    if filters.labels.is_empty() {
        return false;
    }
    if filters.labels.len() == run.labels.len() {
        return true;
    }
    filters.labels.contains(label)
}
