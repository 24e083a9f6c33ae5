//! Comparison pipeline
//!
//! `compare(a, b, ctx)` is the single entry point: it builds the per-term
//! series, range change and winner for every catalog metric, then tallies the
//! scorecard. Everything is recomputed from immutable inputs on each call.
//!
//! Global invariants enforced:
//! - Deterministic: metric order follows the catalog, no clocks, no randomness
//! - A metric without a loaded series compares as all-null, never an error
//! - Range change always reads raw levels; the display field only picks the shown series

use crate::metrics::{MetricCatalog, MetricDefinition};
use crate::registry::{Party, TermRegistry};
use crate::scorecard::{ComparisonResult, Directionality, Scorecard, Side};
use crate::selection::Selection;
use crate::series::{LatestPartial, SeriesSet, ValueField, YearMap};
use crate::term_series::TermSeries;
use serde::Serialize;
use tracing::debug;

/// Immutable inputs shared by every comparison
#[derive(Debug, Clone, Copy)]
pub struct ComparisonContext<'a> {
    pub registry: &'a TermRegistry,
    pub catalog: &'a MetricCatalog,
    pub series: &'a SeriesSet,
    pub latest: LatestPartial,
}

/// Resolved description of one selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectionSummary {
    pub key: Selection,
    pub label: String,
    pub short_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<Party>,
    pub years: Vec<i32>,
    pub known: bool,
}

impl SelectionSummary {
    fn new(selection: &Selection, registry: &TermRegistry) -> Self {
        SelectionSummary {
            key: selection.clone(),
            label: selection.label(registry),
            short_label: selection.short_label(registry),
            party: selection.party(registry),
            years: selection.years(registry),
            known: selection.is_known(registry),
        }
    }
}

/// One side of one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SideSummary {
    pub series: TermSeries,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub average: Option<f64>,
    pub range_change: Option<f64>,
}

impl SideSummary {
    fn build(
        selection: &Selection,
        registry: &TermRegistry,
        display: &YearMap,
        levels: &YearMap,
    ) -> Self {
        let series = selection.term_series(registry, display);
        SideSummary {
            start: series.first_available().map(|(_, v)| v),
            end: series.last_available().map(|(_, v)| v),
            average: series.average(),
            range_change: selection.range_change(registry, levels),
            series,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricComparison {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    pub directionality: Directionality,
    pub display: ValueField,
    pub available: bool,
    pub a: SideSummary,
    pub b: SideSummary,
    pub winner: Side,
}

impl MetricComparison {
    pub fn result(&self) -> ComparisonResult {
        ComparisonResult {
            metric: self.id.clone(),
            range_change_a: self.a.range_change,
            range_change_b: self.b.range_change,
            winner_side: self.winner,
        }
    }
}

/// Full output of one A-vs-B comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Comparison {
    pub a: SelectionSummary,
    pub b: SelectionSummary,
    pub latest_partial: LatestPartial,
    pub metrics: Vec<MetricComparison>,
    pub scorecard: Scorecard,
    pub overall_winner: Side,
}

impl Comparison {
    pub fn results(&self) -> Vec<ComparisonResult> {
        self.metrics.iter().map(MetricComparison::result).collect()
    }
}

/// Compare two selections across every catalog metric
pub fn compare(a: &Selection, b: &Selection, ctx: &ComparisonContext<'_>) -> Comparison {
    let metrics: Vec<MetricComparison> = ctx
        .catalog
        .metrics()
        .iter()
        .map(|metric| compare_metric(metric, a, b, ctx))
        .collect();

    let results: Vec<ComparisonResult> = metrics.iter().map(MetricComparison::result).collect();
    let scorecard = Scorecard::tally(&results);
    let overall_winner = scorecard.overall_winner();

    debug!(
        a = %a,
        b = %b,
        wins_a = scorecard.wins_a,
        wins_b = scorecard.wins_b,
        "comparison complete"
    );

    Comparison {
        a: SelectionSummary::new(a, ctx.registry),
        b: SelectionSummary::new(b, ctx.registry),
        latest_partial: ctx.latest,
        metrics,
        scorecard,
        overall_winner,
    }
}

fn compare_metric(
    metric: &MetricDefinition,
    a: &Selection,
    b: &Selection,
    ctx: &ComparisonContext<'_>,
) -> MetricComparison {
    let series = ctx.series.get(&metric.id);
    if series.is_none() {
        debug!(metric = %metric.id, "no series loaded; comparing as empty");
    }

    let levels = series
        .map(|s| s.levels(ctx.latest))
        .unwrap_or_default();
    let display = match (series, metric.display) {
        (Some(s), ValueField::Yoy) => s.year_map(ValueField::Yoy, ctx.latest),
        _ => levels.clone(),
    };

    let side_a = SideSummary::build(a, ctx.registry, &display, &levels);
    let side_b = SideSummary::build(b, ctx.registry, &display, &levels);
    let result = ComparisonResult::new(
        metric.id.clone(),
        side_a.range_change,
        side_b.range_change,
        metric.directionality,
    );

    MetricComparison {
        id: metric.id.clone(),
        title: metric.title.clone(),
        units: series.map(|s| s.meta().units.clone()),
        directionality: metric.directionality,
        display: metric.display,
        available: series.is_some_and(|s| !s.observations().is_empty()),
        a: side_a,
        b: side_b,
        winner: result.winner_side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;

    fn series(id: &str, rows: &[(i32, f64)]) -> Series {
        let data: Vec<String> = rows
            .iter()
            .map(|(y, v)| format!(r#"{{"year": {}, "value": {}}}"#, y, v))
            .collect();
        let json = format!(
            r#"{{"meta": {{"id": "{}", "title": "{}", "units": "Index", "coverage": {{"start": {}, "end": {}}}}}, "data": [{}]}}"#,
            id,
            id,
            rows.first().map(|r| r.0).unwrap_or(2000),
            rows.last().map(|r| r.0).unwrap_or(2000),
            data.join(",")
        );
        Series::from_json(&json).unwrap()
    }

    #[test]
    fn test_compare_terms() {
        let registry = TermRegistry::builtin();
        let catalog = MetricCatalog::builtin().filtered(|id| id == "unemployment" || id == "gdp");
        let set: SeriesSet = [
            series(
                "unemployment",
                &[(2016, 4.0), (2017, 4.0), (2020, 6.0), (2021, 3.0), (2024, 4.5)],
            ),
            series("gdp", &[(2016, 100.0), (2020, 110.0)]),
        ]
        .into_iter()
        .collect();
        let ctx = ComparisonContext {
            registry: &registry,
            catalog: &catalog,
            series: &set,
            latest: LatestPartial::Include,
        };

        let out = compare(&"trump-1".parse().unwrap(), &"biden-1".parse().unwrap(), &ctx);
        assert_eq!(out.metrics.len(), 2);
        assert_eq!(out.metrics[0].id, "gdp");

        // gdp: trump-1 first data year 2020 preceded by missing 2019
        assert_eq!(out.metrics[0].a.range_change, None);
        assert_eq!(out.metrics[0].winner, Side::None);

        // unemployment: trump 4.0 -> 6.0 (+50%), biden 6.0 -> 4.5 (-25%)
        let u = &out.metrics[1];
        assert_eq!(u.a.range_change, Some(50.0));
        assert_eq!(u.b.range_change, Some(-25.0));
        assert_eq!(u.winner, Side::B);
        assert_eq!(u.a.start, Some(4.0));
        assert_eq!(u.a.end, Some(6.0));
        assert_eq!(u.a.average, Some(5.0));

        assert_eq!(out.scorecard.metrics_b, vec!["unemployment"]);
        assert_eq!(out.overall_winner, Side::B);
        assert_eq!(out.results().len(), 2);
    }

    #[test]
    fn test_missing_series_is_all_null() {
        let registry = TermRegistry::builtin();
        let catalog = MetricCatalog::builtin();
        let set = SeriesSet::new();
        let ctx = ComparisonContext {
            registry: &registry,
            catalog: &catalog,
            series: &set,
            latest: LatestPartial::Include,
        };
        let out = compare(&"party-R".parse().unwrap(), &"party-D".parse().unwrap(), &ctx);
        assert_eq!(out.metrics.len(), 12);
        assert!(out.metrics.iter().all(|m| !m.available && m.a.series.is_empty()));
        assert_eq!(out.scorecard, Scorecard::default());
        assert_eq!(out.overall_winner, Side::None);
    }
}
