//! Baseline range-change calculator
//!
//! Global invariants enforced:
//! - A specific term is anchored to the raw level of the year before its first
//!   available year, and ends at the raw level of its last available year
//! - Missing or zero baselines yield `None`, never NaN or infinity
//! - Party aggregates use simple first-vs-last change of the averaged series

use crate::normalize::percent_change;
use crate::registry::TermRegistry;
use crate::series::YearMap;
use crate::term_series::{build_term_series, term_years, TermSeries};

/// Percent change across a term, anchored to the year before its first data year
pub fn baseline_range_change(registry: &TermRegistry, id: &str, levels: &YearMap) -> Option<f64> {
    let years = term_years(registry, id);
    let series = build_term_series(registry, id, levels);

    let (first_index, _) = series.first_available()?;
    let (_, end) = series.last_available()?;
    let first_year = *years.get(first_index)?;

    let baseline = levels.get(first_year.checked_sub(1)?)?;
    percent_change(baseline, end)
}

/// First-available vs last-available percent change within one series
pub fn simple_range_change(series: &TermSeries) -> Option<f64> {
    let (_, first) = series.first_available()?;
    let (_, last) = series.last_available()?;
    percent_change(first, last)
}
