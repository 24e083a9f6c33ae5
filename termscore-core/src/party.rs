//! Party aggregator
//!
//! Averages the term series of every administration of one party, slot by
//! slot. Each term counts equally; nulls are excluded rather than read as 0.

use crate::registry::{Party, TermRegistry, TERM_SLOTS};
use crate::series::YearMap;
use crate::term_series::{build_term_series, TermSeries};

/// Per-slot arithmetic mean across all terms of `party`
pub fn aggregate_party(registry: &TermRegistry, party: Party, map: &YearMap) -> TermSeries {
    let terms: Vec<TermSeries> = registry
        .terms_of_party(party)
        .iter()
        .map(|term| build_term_series(registry, &term.id, map))
        .collect();
    mean_by_slot(&terms)
}

/// Slot-wise mean of non-null values; a slot with no contributors is null
pub fn mean_by_slot(terms: &[TermSeries]) -> TermSeries {
    let mut slots = [None; TERM_SLOTS];
    for (index, slot) in slots.iter_mut().enumerate() {
        let values: Vec<f64> = terms.iter().filter_map(|t| t.get(index)).collect();
        if !values.is_empty() {
            *slot = Some(values.iter().sum::<f64>() / values.len() as f64);
        }
    }
    TermSeries::from_slots(slots)
}
