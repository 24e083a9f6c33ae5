//! Series normalization
//!
//! Turns raw annual, quarterly, or monthly observations into the uniform
//! annual representation consumed by the comparison engine.
//!
//! Global invariants enforced:
//! - One annual row per year; a year is final only once its closing period is observed
//! - Annual `yoy` compares against `year - 1` only
//! - The latest partial row compares against the same period one year earlier
//! - Extrapolation never adds more than `MAX_EXTRAPOLATION_YEARS` years
//! - Every splice, backfill, extrapolation, or combination is described in `meta.notes`
//! - Values are never rounded

use crate::series::{
    is_valid_year, Coverage, Series, SeriesError, SeriesFile, SeriesMeta, SeriesRow, SourceInfo,
    SubPeriod, YearMap,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Hard cap on trailing extrapolation
pub const MAX_EXTRAPOLATION_YEARS: u32 = 2;

/// Number of trailing growth rates averaged for extrapolation
const EXTRAPOLATION_RATES: usize = 3;

/// Percent change from `prev` to `curr`
///
/// `None` when `prev` is zero or any input or the result is not finite.
pub fn percent_change(prev: f64, curr: f64) -> Option<f64> {
    if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
        return None;
    }
    let change = (curr - prev) / prev * 100.0;
    change.is_finite().then_some(change)
}

/// A single raw observation: annual, monthly, or quarterly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodObservation {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u8>,
    pub value: f64,
}

/// How sub-annual observations collapse into one annual value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnualRule {
    /// Level at the closing period (December or Q4)
    #[default]
    Closing,
    /// Mean of the year's observations
    Mean,
    /// Sum of the year's flows
    Sum,
}

/// How two raw series are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// `a / b`
    Ratio,
    /// `a / (b / 100)`, deflating by an index based at 100
    Deflate,
}

/// Metadata of a raw series; coverage is derived during normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeta {
    pub id: String,
    pub title: String,
    pub units: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Raw input deposited by an upstream fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub meta: RawMeta,
    pub observations: Vec<PeriodObservation>,
}

impl RawSeries {
    pub fn from_json(json: &str) -> Result<RawSeries> {
        serde_json::from_str(json).context("failed to parse raw series JSON")
    }

    pub fn load(path: &Path) -> Result<RawSeries> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read raw series: {}", path.display()))?;
        RawSeries::from_json(&content).with_context(|| format!("failed to load {}", path.display()))
    }
}

/// A correlated proxy used to synthesize years before upstream coverage
#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    pub proxy_id: String,
    pub proxy: YearMap,
    pub target_start: i32,
}

/// A second source whose annual levels fill years before the primary's first year
#[derive(Debug, Clone, PartialEq)]
pub struct Splice {
    pub fallback: RawSeries,
}

/// A second raw series joined with the primary before annualisation
#[derive(Debug, Clone, PartialEq)]
pub struct CombineWith {
    pub other: RawSeries,
    pub method: Combine,
}

/// Options for `normalize`
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeSpec {
    pub rule: AnnualRule,
    pub fiscal_year_start_month: Option<u8>,
    pub combine_with: Option<CombineWith>,
    pub splice: Option<Splice>,
    pub backfill: Option<Backfill>,
    pub extrapolate_through: Option<i32>,
    pub max_extrapolation_years: u32,
    pub output_from: Option<i32>,
    pub complete_through: Option<i32>,
    pub include_latest: bool,
}

impl Default for NormalizeSpec {
    fn default() -> Self {
        NormalizeSpec {
            rule: AnnualRule::Closing,
            fiscal_year_start_month: None,
            combine_with: None,
            splice: None,
            backfill: None,
            extrapolate_through: None,
            max_extrapolation_years: MAX_EXTRAPOLATION_YEARS,
            output_from: None,
            complete_through: None,
            include_latest: true,
        }
    }
}

/// A method applied to the data, recorded in the output notes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    Combined { other: String, method: Combine },
    FiscalYear { start_month: u8 },
    Spliced { source: String, from: i32, to: i32 },
    Backfill { proxy: String, from: i32, to: i32 },
    Extrapolation { from: i32, to: i32, growth_pct: f64 },
}

impl Adjustment {
    pub fn describe(&self) -> String {
        match self {
            Adjustment::Combined {
                other,
                method: Combine::Ratio,
            } => format!("Values are a ratio over {}.", other),
            Adjustment::Combined {
                other,
                method: Combine::Deflate,
            } => format!("Values are deflated by {} (index = 100).", other),
            Adjustment::FiscalYear { start_month } => format!(
                "Annual values are fiscal years beginning in month {}.",
                start_month
            ),
            Adjustment::Spliced { source, from, to } => format!(
                "Years {}-{} filled from {} annual values.",
                from, to, source
            ),
            Adjustment::Backfill { proxy, from, to } => format!(
                "Years {}-{} backfilled by chaining {} growth backward.",
                from, to, proxy
            ),
            Adjustment::Extrapolation {
                from,
                to,
                growth_pct,
            } => format!(
                "Years {}-{} extrapolated at {:.2}% per year (mean of the last {} annual growth rates).",
                from, to, growth_pct, EXTRAPOLATION_RATES
            ),
        }
    }
}

/// Join two observation lists on (year, month, quarter)
///
/// Points without a partner or with a zero denominator are dropped.
pub fn combine_observations(
    a: &[PeriodObservation],
    b: &[PeriodObservation],
    method: Combine,
) -> Vec<PeriodObservation> {
    let denominators: BTreeMap<(i32, Option<u8>, Option<u8>), f64> = b
        .iter()
        .map(|o| ((o.year, o.month, o.quarter), o.value))
        .collect();

    let mut out: Vec<PeriodObservation> = a
        .iter()
        .filter_map(|o| {
            let d = *denominators.get(&(o.year, o.month, o.quarter))?;
            let value = match method {
                Combine::Ratio if d != 0.0 => o.value / d,
                Combine::Deflate if d != 0.0 => o.value / (d / 100.0),
                _ => return None,
            };
            value.is_finite().then_some(PeriodObservation { value, ..*o })
        })
        .collect();

    out.sort_by_key(|o| (o.year, o.month, o.quarter));
    out
}

/// Fill years before the first known year with a fallback source's levels
///
/// The primary wins wherever both have a value; fallback years at or after
/// the primary's first year are ignored.
pub fn splice_fallback(
    annual: &YearMap,
    fallback: &YearMap,
    fallback_id: &str,
) -> (YearMap, Option<Adjustment>) {
    let mut out = annual.clone();
    let first = annual.first_year();

    let mut filled = fallback
        .iter()
        .filter(|(year, _)| first.map_or(true, |f| *year < f))
        .peekable();
    let from = match filled.peek() {
        Some((year, _)) => *year,
        None => return (out, None),
    };
    let mut to = from;
    for (year, value) in filled {
        out.insert(year, value);
        to = year;
    }

    debug!(source = fallback_id, from, to, "spliced fallback years");
    let adjustment = Adjustment::Spliced {
        source: fallback_id.to_string(),
        from,
        to,
    };
    (out, Some(adjustment))
}

/// Synthesize years before the first known year by chaining proxy growth backward
///
/// `estimate(y) = estimate(y + 1) / (proxy(y + 1) / proxy(y))`, stopping at the
/// first year the chain cannot be computed.
pub fn backfill_with_proxy(
    annual: &YearMap,
    proxy: &YearMap,
    proxy_id: &str,
    target_start: i32,
) -> (YearMap, Option<Adjustment>) {
    let mut out = annual.clone();
    let (first, mut estimate) = match annual.iter().next() {
        Some(first) => first,
        None => return (out, None),
    };

    let mut earliest = first;
    for year in (target_start..first).rev() {
        // year < first, so year + 1 cannot overflow
        let step = match (proxy.get(year + 1), proxy.get(year)) {
            (Some(next), Some(curr)) if next != 0.0 && curr != 0.0 => next / curr,
            _ => {
                warn!(proxy = proxy_id, year, "backfill chain broken");
                break;
            }
        };
        let next_estimate = estimate / step;
        if !next_estimate.is_finite() {
            warn!(proxy = proxy_id, year, "backfill produced a non-finite value");
            break;
        }
        estimate = next_estimate;
        out.insert(year, estimate);
        earliest = year;
    }

    let adjustment = (earliest < first).then(|| Adjustment::Backfill {
        proxy: proxy_id.to_string(),
        from: earliest,
        to: first - 1,
    });
    (out, adjustment)
}

/// Extend the series past its last known year by compounding recent growth
///
/// Growth is the mean of the last three year-over-year rates among the last
/// four known years; zero bases are skipped. Fewer than two known years, or no
/// usable rate, means nothing is added.
pub fn extrapolate_trailing(
    annual: &YearMap,
    through_year: i32,
    max_years: u32,
) -> (YearMap, Option<Adjustment>) {
    let mut out = annual.clone();

    let max_years = if max_years > MAX_EXTRAPOLATION_YEARS {
        warn!(
            requested = max_years,
            cap = MAX_EXTRAPOLATION_YEARS,
            "extrapolation limit clamped"
        );
        MAX_EXTRAPOLATION_YEARS
    } else {
        max_years
    };

    let known: Vec<(i32, f64)> = annual.iter().collect();
    let (last_year, last_value) = match known.last() {
        Some(last) if known.len() >= 2 => *last,
        _ => return (out, None),
    };
    if through_year <= last_year || max_years == 0 {
        return (out, None);
    }

    let mut years =
        u32::try_from(i64::from(through_year) - i64::from(last_year)).unwrap_or(u32::MAX);
    if years > max_years {
        warn!(
            through_year,
            last_year, max_years, "extrapolation horizon clamped"
        );
        years = max_years;
    }

    let window = &known[known.len().saturating_sub(EXTRAPOLATION_RATES + 1)..];
    let rates: Vec<f64> = window
        .windows(2)
        .filter(|pair| pair[0].1 != 0.0)
        .map(|pair| pair[1].1 / pair[0].1 - 1.0)
        .filter(|r| r.is_finite())
        .collect();
    if rates.is_empty() {
        debug!(last_year, "no usable growth rate for extrapolation");
        return (out, None);
    }
    let growth = rates.iter().sum::<f64>() / rates.len() as f64;

    let mut added_through = last_year;
    for k in 1..=years {
        let value = last_value * (1.0 + growth).powi(k as i32);
        let year = match last_year.checked_add(k as i32) {
            Some(year) if value.is_finite() => year,
            _ => break,
        };
        out.insert(year, value);
        added_through = year;
    }

    let adjustment = (added_through > last_year).then(|| Adjustment::Extrapolation {
        from: last_year + 1,
        to: added_through,
        growth_pct: growth * 100.0,
    });
    (out, adjustment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Annual,
    Monthly,
    Quarterly,
}

impl Granularity {
    fn periods(self) -> u8 {
        match self {
            Granularity::Annual => 1,
            Granularity::Monthly => 12,
            Granularity::Quarterly => 4,
        }
    }
}

/// Observations bucketed by (period year, position within that year)
struct Buckets {
    granularity: Granularity,
    years: BTreeMap<i32, BTreeMap<u8, f64>>,
    /// Most recent observation: period year, position, calendar sub-period
    last: Option<(i32, u8, Option<SubPeriod>)>,
}

impl Buckets {
    fn closing(&self) -> u8 {
        self.granularity.periods()
    }

    fn annual_value(&self, periods: &BTreeMap<u8, f64>, rule: AnnualRule) -> Option<f64> {
        let closing = *periods.get(&self.closing())?;
        match rule {
            AnnualRule::Closing => Some(closing),
            AnnualRule::Mean => Some(periods.values().sum::<f64>() / periods.len() as f64),
            AnnualRule::Sum => Some(periods.values().sum()),
        }
    }

    /// Sum of positions `1..=through`, requiring every one of them
    fn to_date_sum(&self, year: i32, through: u8) -> Option<f64> {
        let periods = self.years.get(&year)?;
        (1..=through).map(|p| periods.get(&p).copied()).sum()
    }

    fn at(&self, year: i32, position: u8) -> Option<f64> {
        self.years.get(&year)?.get(&position).copied()
    }

    /// Finalized annual values, optionally cut off after `complete_through`
    fn annualize(&self, rule: AnnualRule, complete_through: Option<i32>) -> YearMap {
        self.years
            .iter()
            .filter(|(year, _)| complete_through.map_or(true, |c| **year <= c))
            .filter_map(|(year, periods)| self.annual_value(periods, rule).map(|v| (*year, v)))
            .collect()
    }
}

fn granularity_of(observations: &[PeriodObservation]) -> Result<Granularity, SeriesError> {
    let mut found: Option<Granularity> = None;
    for (index, o) in observations.iter().enumerate() {
        if !is_valid_year(o.year) {
            return Err(SeriesError::YearOutOfRange { year: o.year });
        }
        let g = match (o.month, o.quarter) {
            (Some(_), Some(_)) => return Err(SeriesError::AmbiguousSubPeriod { index }),
            (Some(month), None) if !(1..=12).contains(&month) => {
                return Err(SeriesError::BadMonth { index, month })
            }
            (None, Some(quarter)) if !(1..=4).contains(&quarter) => {
                return Err(SeriesError::BadQuarter { index, quarter })
            }
            (Some(_), None) => Granularity::Monthly,
            (None, Some(_)) => Granularity::Quarterly,
            (None, None) => Granularity::Annual,
        };
        if !o.value.is_finite() {
            return Err(SeriesError::NonFinite {
                index,
                year: o.year,
                field: "value",
            });
        }
        match found {
            Some(prev) if prev != g => return Err(SeriesError::MixedGranularity),
            _ => found = Some(g),
        }
    }
    Ok(found.unwrap_or(Granularity::Annual))
}

fn bucket(
    observations: &[PeriodObservation],
    fiscal_start: Option<u8>,
) -> Result<Buckets, SeriesError> {
    let granularity = granularity_of(observations)?;

    if let Some(start) = fiscal_start {
        if !(1..=12).contains(&start) {
            return Err(SeriesError::BadFiscalStart(start));
        }
        if granularity != Granularity::Monthly {
            return Err(SeriesError::FiscalNeedsMonths);
        }
    }
    let start = fiscal_start.unwrap_or(1);

    let mut years: BTreeMap<i32, BTreeMap<u8, f64>> = BTreeMap::new();
    let mut last: Option<(i32, u8, Option<SubPeriod>)> = None;

    for o in observations {
        let (year, position, sub_period) = match (o.month, o.quarter) {
            (Some(m), _) => {
                let year = if start != 1 && m >= start {
                    o.year + 1
                } else {
                    o.year
                };
                (year, (m + 12 - start) % 12 + 1, Some(SubPeriod::Month(m)))
            }
            (None, Some(q)) => (o.year, q, Some(SubPeriod::Quarter(q))),
            (None, None) => (o.year, 1, None),
        };

        let slot = years.entry(year).or_default();
        if slot.insert(position, o.value).is_some() {
            return Err(match granularity {
                Granularity::Annual => SeriesError::DuplicateYear { year },
                _ => SeriesError::DuplicatePeriod {
                    year,
                    period: position,
                },
            });
        }

        if last.map_or(true, |(ly, lp, _)| (year, position) > (ly, lp)) {
            last = Some((year, position, sub_period));
        }
    }

    Ok(Buckets {
        granularity,
        years,
        last,
    })
}

/// Normalize a raw series into a validated annual series
pub fn normalize(raw: &RawSeries, spec: &NormalizeSpec) -> Result<Series> {
    let id = raw.meta.id.clone();
    let mut adjustments = Vec::new();

    let observations = match &spec.combine_with {
        Some(combine) => {
            adjustments.push(Adjustment::Combined {
                other: combine.other.meta.id.clone(),
                method: combine.method,
            });
            combine_observations(&raw.observations, &combine.other.observations, combine.method)
        }
        None => raw.observations.clone(),
    };

    let buckets = bucket(&observations, spec.fiscal_year_start_month)
        .with_context(|| format!("invalid observations for {:?}", id))?;
    if let Some(start_month) = spec.fiscal_year_start_month.filter(|m| *m != 1) {
        adjustments.push(Adjustment::FiscalYear { start_month });
    }

    let mut annual = buckets.annualize(spec.rule, spec.complete_through);

    if let Some(splice) = &spec.splice {
        let fallback_id = &splice.fallback.meta.id;
        let fallback = bucket(&splice.fallback.observations, spec.fiscal_year_start_month)
            .with_context(|| format!("invalid observations for fallback {:?}", fallback_id))?
            .annualize(spec.rule, spec.complete_through);
        let (spliced, adjustment) = splice_fallback(&annual, &fallback, fallback_id);
        annual = spliced;
        adjustments.extend(adjustment);
    }

    if let Some(backfill) = &spec.backfill {
        let (filled, adjustment) = backfill_with_proxy(
            &annual,
            &backfill.proxy,
            &backfill.proxy_id,
            backfill.target_start,
        );
        annual = filled;
        adjustments.extend(adjustment);
    }

    if let Some(through) = spec.extrapolate_through {
        let (extended, adjustment) =
            extrapolate_trailing(&annual, through, spec.max_extrapolation_years);
        annual = extended;
        adjustments.extend(adjustment);
    }

    let output_from = spec.output_from.unwrap_or(i32::MIN);
    let mut rows: Vec<SeriesRow> = annual
        .iter()
        .filter(|(year, _)| *year >= output_from)
        .map(|(year, value)| SeriesRow {
            year,
            value,
            yoy: year
                .checked_sub(1)
                .and_then(|prev_year| annual.get(prev_year))
                .and_then(|prev| percent_change(prev, value)),
            latest: false,
            month: None,
            quarter: None,
        })
        .collect();

    if spec.include_latest {
        if let Some(row) = latest_row(&buckets, spec.rule) {
            let last_annual = rows.last().map(|r| r.year);
            if row.year < output_from || last_annual.is_some_and(|y| row.year < y) {
                debug!(id = %id, year = row.year, "latest period precedes annual rows; dropped");
            } else {
                rows.push(row);
            }
        }
    }

    let (start, end) = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => (first.year, last.year),
        _ => bail!("series {:?} has no observations to normalize", id),
    };

    let notes = merge_notes(raw.meta.notes.as_deref(), &adjustments);
    let file = SeriesFile {
        meta: SeriesMeta {
            id: raw.meta.id.clone(),
            title: raw.meta.title.clone(),
            units: raw.meta.units.clone(),
            frequency: raw.meta.frequency.clone(),
            coverage: Coverage { start, end },
            source: raw.meta.source.clone(),
            description: raw.meta.description.clone(),
            notes,
            flow: spec.rule == AnnualRule::Sum,
        },
        data: rows,
    };

    debug!(id = %id, start, end, adjustments = adjustments.len(), "normalized series");
    Series::from_file(file).with_context(|| format!("normalized series {:?} is invalid", id))
}

fn latest_row(buckets: &Buckets, rule: AnnualRule) -> Option<SeriesRow> {
    let (year, position, sub_period) = buckets.last?;
    if position == buckets.closing() {
        return None;
    }
    let prior_year = year.checked_sub(1)?;

    let (value, prior) = match rule {
        AnnualRule::Closing | AnnualRule::Mean => {
            (buckets.at(year, position)?, buckets.at(prior_year, position))
        }
        AnnualRule::Sum => (
            buckets.to_date_sum(year, position)?,
            buckets.to_date_sum(prior_year, position),
        ),
    };

    Some(SeriesRow {
        year,
        value,
        yoy: prior.and_then(|p| percent_change(p, value)),
        latest: true,
        month: match sub_period {
            Some(SubPeriod::Month(m)) => Some(m),
            _ => None,
        },
        quarter: match sub_period {
            Some(SubPeriod::Quarter(q)) => Some(q),
            _ => None,
        },
    })
}

fn merge_notes(existing: Option<&str>, adjustments: &[Adjustment]) -> Option<String> {
    let parts: Vec<String> = existing
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .into_iter()
        .chain(adjustments.iter().map(Adjustment::describe))
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}
