//! Term series builder
//!
//! Aligns a year-keyed series onto the four term-year slots of an
//! administration. Slot `i` is the `i`-th calendar year of the term, so two
//! administrations' second years line up even when they are decades apart.

use crate::registry::{TermRegistry, TERM_SLOTS};
use crate::series::YearMap;
use serde::{Deserialize, Serialize};

/// Four slots, one per term year; absence is explicit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermSeries([Option<f64>; TERM_SLOTS]);

impl TermSeries {
    /// All-null series
    pub fn empty() -> Self {
        TermSeries([None; TERM_SLOTS])
    }

    pub fn from_slots(slots: [Option<f64>; TERM_SLOTS]) -> Self {
        TermSeries(slots)
    }

    pub fn slots(&self) -> &[Option<f64>; TERM_SLOTS] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied().flatten()
    }

    /// Index and value of the first non-null slot
    pub fn first_available(&self) -> Option<(usize, f64)> {
        self.0
            .iter()
            .enumerate()
            .find_map(|(i, v)| v.map(|v| (i, v)))
    }

    /// Index and value of the last non-null slot
    pub fn last_available(&self) -> Option<(usize, f64)> {
        self.0
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, v)| v.map(|v| (i, v)))
    }

    pub fn available(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Mean of the non-null slots
    pub fn average(&self) -> Option<f64> {
        let values: Vec<f64> = self.0.iter().flatten().copied().collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Calendar years of a term; empty for unknown ids
pub fn term_years(registry: &TermRegistry, id: &str) -> Vec<i32> {
    registry.term(id).map(|t| t.years()).unwrap_or_default()
}

/// Build the 4-slot series for an administration
///
/// An id missing from the registry yields an all-null series.
pub fn build_term_series(registry: &TermRegistry, id: &str, map: &YearMap) -> TermSeries {
    let mut slots = [None; TERM_SLOTS];
    for (slot, year) in slots.iter_mut().zip(term_years(registry, id)) {
        *slot = map.get(year);
    }
    TermSeries(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(i32, f64)]) -> YearMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_slots_align_to_term_years() {
        let registry = TermRegistry::builtin();
        let levels = map(&[(2016, 1.0), (2017, 2.0), (2018, 3.0), (2020, 5.0), (2021, 6.0)]);
        let series = build_term_series(&registry, "trump-1", &levels);
        assert_eq!(series.slots(), &[Some(2.0), Some(3.0), None, Some(5.0)]);
    }

    #[test]
    fn test_unknown_id_is_all_null() {
        let registry = TermRegistry::builtin();
        let series = build_term_series(&registry, "nobody-1", &map(&[(2000, 1.0)]));
        assert!(series.is_empty());
        assert!(term_years(&registry, "nobody-1").is_empty());
    }

    #[test]
    fn test_in_progress_term_leaves_trailing_slots_null() {
        let registry = TermRegistry::builtin();
        let levels = map(&[(2025, 1.0), (2026, 2.0)]);
        let series = build_term_series(&registry, "trump-2", &levels);
        assert_eq!(series.slots(), &[Some(1.0), Some(2.0), None, None]);
    }

    #[test]
    fn test_first_last_average() {
        let series = TermSeries::from_slots([None, Some(2.0), None, Some(4.0)]);
        assert_eq!(series.first_available(), Some((1, 2.0)));
        assert_eq!(series.last_available(), Some((3, 4.0)));
        assert_eq!(series.average(), Some(3.0));
        assert_eq!(series.available(), 2);
        assert_eq!(TermSeries::empty().average(), None);
        assert_eq!(TermSeries::empty().first_available(), None);
    }

    #[test]
    fn test_serializes_as_array_with_nulls() {
        let series = TermSeries::from_slots([Some(1.5), None, None, Some(2.0)]);
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, "[1.5,null,null,2.0]");
    }
}
