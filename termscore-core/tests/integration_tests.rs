//! Integration tests for loading fixture series and comparing selections

use std::path::PathBuf;
use termscore_core::normalize::{
    normalize, AnnualRule, Backfill, Combine, CombineWith, NormalizeSpec, RawSeries,
};
use termscore_core::series::{load_series_dir, load_series_dir_detailed, ValueField};
use termscore_core::{
    compare, render_json, render_text, ComparisonContext, LatestPartial, MetricCatalog,
    Selection, SeriesSet, Side, TermRegistry,
};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture_series() -> SeriesSet {
    load_series_dir(&fixture_path("series")).unwrap()
}

fn sel(s: &str) -> Selection {
    s.parse().unwrap()
}

fn approx(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-9)
}

#[test]
fn test_load_fixture_directory() {
    let set = fixture_series();
    let ids: Vec<&str> = set.ids().collect();
    assert_eq!(ids, vec!["cpi", "deficit", "gdp", "unemployment"]);
    assert!(set.get("unemployment").unwrap().latest().is_some());
    assert!(set.get("deficit").unwrap().latest().is_none());
}

#[test]
fn test_invalid_files_are_reported_and_skipped() {
    let (set, statuses) = load_series_dir_detailed(&fixture_path("invalid")).unwrap();
    assert_eq!(set.len(), 1);
    assert!(set.get("gas_prices").is_some());

    let failed: Vec<String> = statuses
        .iter()
        .filter(|s| s.error.is_some())
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(failed, vec!["duplicate_year.json", "not_json.json"]);
}

#[test]
fn test_yoy_matches_levels_in_fixtures() {
    // Stored yoy values are rounded to two decimals
    for series in fixture_series().iter() {
        let levels = series.levels(LatestPartial::Exclude);
        let yoy = series.year_map(ValueField::Yoy, LatestPartial::Exclude);
        for (year, value) in levels.iter() {
            if let (Some(prev), Some(stored)) = (levels.get(year - 1), yoy.get(year)) {
                let expected = (value - prev) / prev * 100.0;
                assert!(
                    (expected - stored).abs() < 0.01,
                    "{} {}: yoy {} vs {}",
                    series.id(),
                    year,
                    stored,
                    expected
                );
            }
        }
    }
}

#[test]
fn test_compare_trump_1_vs_biden_1() {
    let registry = TermRegistry::builtin();
    let catalog = MetricCatalog::builtin();
    let set = fixture_series();
    let ctx = ComparisonContext {
        registry: &registry,
        catalog: &catalog,
        series: &set,
        latest: LatestPartial::Include,
    };

    let out = compare(&sel("trump-1"), &sel("biden-1"), &ctx);
    assert_eq!(out.metrics.len(), 12);

    let metric = |id: &str| out.metrics.iter().find(|m| m.id == id).unwrap();

    let unemployment = metric("unemployment");
    assert!(approx(unemployment.a.range_change, 2.0 / 4.7 * 100.0));
    assert!(approx(unemployment.b.range_change, -2.6 / 6.7 * 100.0));
    assert_eq!(unemployment.winner, Side::B);

    let cpi = metric("cpi");
    assert_eq!(cpi.winner, Side::A);
    // CPI displays yoy, but start/end come from that displayed series
    assert_eq!(cpi.display, ValueField::Yoy);
    assert_eq!(cpi.a.start, Some(2.11));

    assert_eq!(metric("gdp").winner, Side::B);
    assert_eq!(metric("deficit").winner, Side::B);
    assert_eq!(metric("sp500").winner, Side::None);
    assert!(!metric("sp500").available);

    assert_eq!(out.scorecard.wins_a, 1);
    assert_eq!(out.scorecard.wins_b, 3);
    assert_eq!(out.scorecard.metrics_a, vec!["cpi"]);
    assert_eq!(out.scorecard.metrics_b, vec!["gdp", "unemployment", "deficit"]);
    assert_eq!(out.overall_winner, Side::B);
}

#[test]
fn test_latest_partial_policy_changes_in_progress_term() {
    let registry = TermRegistry::builtin();
    let catalog = MetricCatalog::builtin().filtered(|id| id == "unemployment");
    let set = fixture_series();

    let run = |latest| {
        let ctx = ComparisonContext {
            registry: &registry,
            catalog: &catalog,
            series: &set,
            latest,
        };
        compare(&sel("trump-2"), &sel("biden-1"), &ctx)
    };

    let included = run(LatestPartial::Include);
    let m = &included.metrics[0];
    assert_eq!(m.a.series.get(0), Some(4.3));
    assert!(approx(m.a.range_change, (4.3 - 4.1) / 4.1 * 100.0));

    let excluded = run(LatestPartial::Exclude);
    let m = &excluded.metrics[0];
    assert!(m.a.series.is_empty());
    assert_eq!(m.a.range_change, None);
    assert_eq!(m.winner, Side::None);
}

#[test]
fn test_party_comparison_uses_simple_change() {
    let registry = TermRegistry::builtin();
    let catalog = MetricCatalog::builtin().filtered(|id| id == "unemployment");
    let set = fixture_series();
    let ctx = ComparisonContext {
        registry: &registry,
        catalog: &catalog,
        series: &set,
        latest: LatestPartial::Include,
    };

    let out = compare(&sel("party-R"), &sel("party-D"), &ctx);
    let m = &out.metrics[0];
    // Republicans: trump-1 [4.1, 3.9, 3.6, 6.7], trump-2 [4.3, -, -, -],
    // gwbush-2 [-, -, -, 7.3]; earlier terms have no data
    assert!(approx(m.a.series.get(0), 4.2));
    assert!(approx(m.a.series.get(1), 3.9));
    assert!(approx(m.a.series.get(3), 7.0));
    assert!(approx(m.a.range_change, (7.0 - 4.2) / 4.2 * 100.0));
    assert!(out.a.years.is_empty());
    assert_eq!(out.a.label, "Republicans (1980-present)");
}

#[test]
fn test_custom_registry_file() {
    let registry = TermRegistry::load(&fixture_path("registry.json")).unwrap();
    assert!(registry.term("first-1").is_some());
    // Entry without a year range degrades to no term
    assert!(registry.entry("orphan-1").is_some());
    assert!(registry.term("orphan-1").is_none());

    let catalog = MetricCatalog::builtin().filtered(|id| id == "gdp");
    let set = fixture_series();
    let ctx = ComparisonContext {
        registry: &registry,
        catalog: &catalog,
        series: &set,
        latest: LatestPartial::Include,
    };
    let out = compare(&sel("first-1"), &sel("orphan-1"), &ctx);
    assert!(approx(out.metrics[0].a.range_change, 1000.0 / 18000.0 * 100.0));
    assert!(out.metrics[0].b.series.is_empty());
    assert!(!out.b.known);
    assert_eq!(out.metrics[0].winner, Side::None);
}

#[test]
fn test_pipeline_is_idempotent() {
    let registry = TermRegistry::builtin();
    let catalog = MetricCatalog::builtin();
    let ctx_set = fixture_series();
    let ctx = ComparisonContext {
        registry: &registry,
        catalog: &catalog,
        series: &ctx_set,
        latest: LatestPartial::Include,
    };

    let first = compare(&sel("obama-2"), &sel("party-R"), &ctx);
    let second = compare(&sel("obama-2"), &sel("party-R"), &ctx);
    assert_eq!(first, second);
    assert_eq!(render_json(&first).unwrap(), render_json(&second).unwrap());
    assert_eq!(render_text(&first), render_text(&second));

    // A fresh load produces the same report
    let reloaded = fixture_series();
    let ctx2 = ComparisonContext {
        series: &reloaded,
        ..ctx
    };
    assert_eq!(compare(&sel("obama-2"), &sel("party-R"), &ctx2), first);
}

#[test]
fn test_swapping_sides_swaps_winners() {
    let registry = TermRegistry::builtin();
    let catalog = MetricCatalog::builtin();
    let set = fixture_series();
    let ctx = ComparisonContext {
        registry: &registry,
        catalog: &catalog,
        series: &set,
        latest: LatestPartial::Include,
    };

    let forward = compare(&sel("trump-1"), &sel("biden-1"), &ctx);
    let backward = compare(&sel("biden-1"), &sel("trump-1"), &ctx);
    for (f, b) in forward.metrics.iter().zip(&backward.metrics) {
        assert_eq!(f.winner, b.winner.swapped(), "{}", f.id);
    }
    assert_eq!(forward.overall_winner, backward.overall_winner.swapped());
}

#[test]
fn test_render_text_placeholders() {
    let registry = TermRegistry::builtin();
    let catalog = MetricCatalog::builtin();
    let set = fixture_series();
    let ctx = ComparisonContext {
        registry: &registry,
        catalog: &catalog,
        series: &set,
        latest: LatestPartial::Include,
    };
    let text = render_text(&compare(&sel("trump-1"), &sel("biden-1"), &ctx));
    assert!(text.contains("A: Trump (2017–2021)"));
    assert!(text.contains("+42.6%"));
    assert!(text.contains("-38.8%"));
    assert!(text.contains("Scorecard: Trump 1, Biden 3"));
    assert!(text.contains("  Trump: Inflation (CPI)\n"));
    assert!(text.contains("  Biden: Real GDP, Unemployment Rate, Federal Deficit\n"));
    assert!(text.contains("Overall: Biden"));
    let sp500 = text.lines().find(|l| l.starts_with("S&P 500")).unwrap();
    assert!(sp500.contains('–'));
}

#[test]
fn test_normalize_fiscal_year_deficit_fixture() {
    let raw = RawSeries::load(&fixture_path("raw/deficit_monthly.json")).unwrap();
    let spec = NormalizeSpec {
        rule: AnnualRule::Sum,
        fiscal_year_start_month: Some(10),
        ..NormalizeSpec::default()
    };
    let series = normalize(&raw, &spec).unwrap();
    let levels = series.levels(LatestPartial::Exclude);
    assert_eq!(levels.get(2022), Some(1200.0));
    assert_eq!(levels.get(2023), Some(1800.0));

    let latest = series.latest().unwrap();
    assert_eq!(latest.year, 2024);
    assert_eq!(latest.value, 400.0);
    // FYTD 400 vs prior FYTD 300
    assert!(approx(latest.yoy, 100.0 / 3.0));
    assert_eq!(series.meta().coverage.start, 2022);
    assert_eq!(series.meta().coverage.end, 2024);
}

#[test]
fn test_normalize_income_gap_with_backfill_and_extrapolation() {
    let p90 = RawSeries::load(&fixture_path("raw/p90.json")).unwrap();
    let p50 = RawSeries::load(&fixture_path("raw/p50.json")).unwrap();

    // Proxy covering earlier years: ratio halves going back one year
    let proxy = [(1982, 1.0), (1983, 1.5), (1984, 2.0)].into_iter().collect();
    let spec = NormalizeSpec {
        combine_with: Some(CombineWith {
            other: p50,
            method: Combine::Ratio,
        }),
        backfill: Some(Backfill {
            proxy_id: "p90_p50_proxy".to_string(),
            proxy,
            target_start: 1980,
        }),
        extrapolate_through: Some(1990),
        ..NormalizeSpec::default()
    };
    let series = normalize(&p90, &spec).unwrap();
    let levels = series.levels(LatestPartial::Include);

    // 1984 = 2.0, 1985 = 2.0, 1986 = 2.1
    assert_eq!(levels.get(1984), Some(2.0));
    assert!(approx(levels.get(1983), 1.5));
    assert!(approx(levels.get(1982), 1.0));
    assert_eq!(levels.get(1981), None);
    // Extrapolation is capped at two years past 1986
    assert!(levels.get(1988).is_some());
    assert_eq!(levels.get(1989), None);

    let notes = series.meta().notes.clone().unwrap();
    assert!(notes.contains("ratio over p50"));
    assert!(notes.contains("backfilled"));
    assert!(notes.contains("extrapolated"));
}
