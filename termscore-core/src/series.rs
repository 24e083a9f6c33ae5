//! Per-metric series files and the validation boundary
//!
//! Every statistic is deposited upstream as one JSON file of annual rows plus
//! at most one latest partial row. This module parses those files into
//! strongly typed, immutable `Series` values before anything reaches the
//! comparison engine.
//!
//! Global invariants enforced:
//! - Rows are ordered by year ascending
//! - At most one annual row per year
//! - At most one `latest` row, and it is the final row
//! - Every number is finite
//! - Every year lies in `MIN_YEAR..=MAX_YEAR`
//! - A file that fails validation is absent, not partially loaded

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Earliest year accepted from any input file
pub const MIN_YEAR: i32 = 1;
/// Latest year accepted from any input file
pub const MAX_YEAR: i32 = 9999;

pub fn is_valid_year(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

/// Provenance of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

/// Declared calendar-year coverage (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub start: i32,
    pub end: i32,
}

/// Series metadata; unknown upstream fields are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub id: String,
    pub title: String,
    pub units: String,
    #[serde(default)]
    pub frequency: String,
    pub coverage: Coverage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Must describe any backfill or extrapolation applied upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Annual values are sums of flows; a year-to-date level is not a year
    #[serde(default, skip_serializing_if = "is_false")]
    pub flow: bool,
}

/// One row as it appears on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub year: i32,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yoy: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub latest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u8>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// On-disk series file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesFile {
    pub meta: SeriesMeta,
    pub data: Vec<SeriesRow>,
}

/// Sub-annual period of a latest partial observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubPeriod {
    Month(u8),
    Quarter(u8),
}

impl SubPeriod {
    /// Periods per year for this granularity
    pub fn per_year(&self) -> u8 {
        match self {
            SubPeriod::Month(_) => 12,
            SubPeriod::Quarter(_) => 4,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            SubPeriod::Month(m) | SubPeriod::Quarter(m) => *m,
        }
    }

    pub fn is_closing(&self) -> bool {
        self.index() == self.per_year()
    }
}

/// Validated observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnnualObservation {
    pub year: i32,
    pub value: f64,
    pub yoy: Option<f64>,
    pub is_latest_partial: bool,
    pub sub_period: Option<SubPeriod>,
}

/// Which observation field a year map is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueField {
    Level,
    Yoy,
}

/// Whether the latest partial row may stand in for its year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatestPartial {
    /// Use the latest row for its year when no finalized annual row exists
    #[default]
    Include,
    /// Ignore latest rows entirely
    Exclude,
}

/// Structural validation failures for a series
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("series id is empty")]
    EmptyId,
    #[error("year {year} is outside {}..={}", MIN_YEAR, MAX_YEAR)]
    YearOutOfRange { year: i32 },
    #[error("coverage start {start} is after coverage end {end}")]
    InvertedCoverage { start: i32, end: i32 },
    #[error("row {index} (year {year}): {field} is not a finite number")]
    NonFinite {
        index: usize,
        year: i32,
        field: &'static str,
    },
    #[error("row {index}: year {year} is out of order")]
    OutOfOrder { index: usize, year: i32 },
    #[error("year {year} has more than one annual row")]
    DuplicateYear { year: i32 },
    #[error("period {period} of year {year} is observed more than once")]
    DuplicatePeriod { year: i32, period: u8 },
    #[error("more than one row is marked latest")]
    MultipleLatest,
    #[error("row {index}: the latest row must be the final row")]
    LatestNotLast { index: usize },
    #[error("row {index}: month {month} is out of range")]
    BadMonth { index: usize, month: u8 },
    #[error("row {index}: quarter {quarter} is out of range")]
    BadQuarter { index: usize, quarter: u8 },
    #[error("row {index}: a row carries a month or a quarter, not both")]
    AmbiguousSubPeriod { index: usize },
    #[error("observations mix annual, monthly and quarterly periods")]
    MixedGranularity,
    #[error("fiscal year start month {0} is out of range")]
    BadFiscalStart(u8),
    #[error("fiscal years require monthly observations")]
    FiscalNeedsMonths,
}

/// Year → value lookup, built once per series and reused
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearMap(BTreeMap<i32, f64>);

impl YearMap {
    pub fn new() -> Self {
        YearMap(BTreeMap::new())
    }

    pub fn get(&self, year: i32) -> Option<f64> {
        self.0.get(&year).copied()
    }

    pub fn insert(&mut self, year: i32, value: f64) -> Option<f64> {
        self.0.insert(year, value)
    }

    pub fn contains(&self, year: i32) -> bool {
        self.0.contains_key(&year)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.0.keys().next().copied()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.0.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.0.iter().map(|(y, v)| (*y, *v))
    }
}

impl FromIterator<(i32, f64)> for YearMap {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        YearMap(iter.into_iter().collect())
    }
}

/// A validated, immutable metric series
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    meta: SeriesMeta,
    observations: Vec<AnnualObservation>,
}

impl Series {
    /// Validate a parsed file into a series
    pub fn from_file(file: SeriesFile) -> Result<Series, SeriesError> {
        validate_meta(&file.meta)?;
        let observations = validate_rows(&file.data)?;
        Ok(Series {
            meta: file.meta,
            observations,
        })
    }

    pub fn from_json(json: &str) -> Result<Series> {
        let file: SeriesFile = serde_json::from_str(json).context("failed to parse series JSON")?;
        let id = file.meta.id.clone();
        Series::from_file(file).with_context(|| format!("invalid series {:?}", id))
    }

    pub fn meta(&self) -> &SeriesMeta {
        &self.meta
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn observations(&self) -> &[AnnualObservation] {
        &self.observations
    }

    /// Finalized annual observations (excludes the latest partial row)
    pub fn annual(&self) -> impl Iterator<Item = &AnnualObservation> + '_ {
        self.observations.iter().filter(|o| !o.is_latest_partial)
    }

    pub fn latest(&self) -> Option<&AnnualObservation> {
        self.observations.last().filter(|o| o.is_latest_partial)
    }

    /// Year map of the requested field
    ///
    /// Finalized annual rows always win; the latest row only fills its year
    /// when `policy` is `Include` and no annual row exists for that year.
    pub fn year_map(&self, field: ValueField, policy: LatestPartial) -> YearMap {
        let pick = |o: &AnnualObservation| match field {
            ValueField::Level => Some(o.value),
            ValueField::Yoy => o.yoy,
        };

        let mut map: YearMap = self
            .annual()
            .filter_map(|o| pick(o).map(|v| (o.year, v)))
            .collect();

        if policy == LatestPartial::Include {
            if let Some(latest) = self.latest() {
                let has_annual = self.annual().any(|o| o.year == latest.year);
                let partial_flow = self.meta.flow && field == ValueField::Level;
                if !has_annual && !partial_flow {
                    if let Some(v) = pick(latest) {
                        map.insert(latest.year, v);
                    }
                }
            }
        }
        map
    }

    /// Raw-level year map
    pub fn levels(&self, policy: LatestPartial) -> YearMap {
        self.year_map(ValueField::Level, policy)
    }

    /// Years inside declared coverage with neither an annual nor a latest row
    pub fn coverage_gaps(&self) -> Vec<i32> {
        let present: HashSet<i32> = self.observations.iter().map(|o| o.year).collect();
        (self.meta.coverage.start..=self.meta.coverage.end)
            .filter(|y| !present.contains(y))
            .collect()
    }

    /// Convert back to the on-disk shape
    pub fn to_file(&self) -> SeriesFile {
        let data = self
            .observations
            .iter()
            .map(|o| SeriesRow {
                year: o.year,
                value: o.value,
                yoy: o.yoy,
                latest: o.is_latest_partial,
                month: match o.sub_period {
                    Some(SubPeriod::Month(m)) => Some(m),
                    _ => None,
                },
                quarter: match o.sub_period {
                    Some(SubPeriod::Quarter(q)) => Some(q),
                    _ => None,
                },
            })
            .collect();
        SeriesFile {
            meta: self.meta.clone(),
            data,
        }
    }

    /// Serialize to a pretty JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_file()).context("failed to serialize series to JSON")
    }
}

fn validate_meta(meta: &SeriesMeta) -> Result<(), SeriesError> {
    if meta.id.trim().is_empty() {
        return Err(SeriesError::EmptyId);
    }
    for year in [meta.coverage.start, meta.coverage.end] {
        if !is_valid_year(year) {
            return Err(SeriesError::YearOutOfRange { year });
        }
    }
    if meta.coverage.start > meta.coverage.end {
        return Err(SeriesError::InvertedCoverage {
            start: meta.coverage.start,
            end: meta.coverage.end,
        });
    }
    Ok(())
}

fn validate_rows(rows: &[SeriesRow]) -> Result<Vec<AnnualObservation>, SeriesError> {
    let mut observations = Vec::with_capacity(rows.len());
    let mut annual_years = HashSet::new();
    let mut prev_year: Option<i32> = None;
    let mut latest_index: Option<usize> = None;

    for (index, row) in rows.iter().enumerate() {
        if !is_valid_year(row.year) {
            return Err(SeriesError::YearOutOfRange { year: row.year });
        }
        if !row.value.is_finite() {
            return Err(SeriesError::NonFinite {
                index,
                year: row.year,
                field: "value",
            });
        }
        if let Some(yoy) = row.yoy {
            if !yoy.is_finite() {
                return Err(SeriesError::NonFinite {
                    index,
                    year: row.year,
                    field: "yoy",
                });
            }
        }

        if prev_year.is_some_and(|p| row.year < p) {
            return Err(SeriesError::OutOfOrder {
                index,
                year: row.year,
            });
        }
        prev_year = Some(row.year);

        let sub_period = sub_period_of(index, row)?;

        if row.latest {
            if latest_index.is_some() {
                return Err(SeriesError::MultipleLatest);
            }
            latest_index = Some(index);
        } else {
            if let Some(li) = latest_index {
                return Err(SeriesError::LatestNotLast { index: li });
            }
            if !annual_years.insert(row.year) {
                return Err(SeriesError::DuplicateYear { year: row.year });
            }
        }

        observations.push(AnnualObservation {
            year: row.year,
            value: row.value,
            yoy: row.yoy,
            is_latest_partial: row.latest,
            sub_period,
        });
    }

    Ok(observations)
}

fn sub_period_of(index: usize, row: &SeriesRow) -> Result<Option<SubPeriod>, SeriesError> {
    match (row.month, row.quarter) {
        (Some(_), Some(_)) => Err(SeriesError::AmbiguousSubPeriod { index }),
        (Some(month), None) if !(1..=12).contains(&month) => {
            Err(SeriesError::BadMonth { index, month })
        }
        (None, Some(quarter)) if !(1..=4).contains(&quarter) => {
            Err(SeriesError::BadQuarter { index, quarter })
        }
        (Some(month), None) => Ok(Some(SubPeriod::Month(month))),
        (None, Some(quarter)) => Ok(Some(SubPeriod::Quarter(quarter))),
        (None, None) => Ok(None),
    }
}

/// All loaded series keyed by metric id
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: BTreeMap<String, Series>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series, replacing any existing series with the same id
    pub fn insert(&mut self, series: Series) -> Option<Series> {
        self.series.insert(series.id().to_string(), series)
    }

    pub fn get(&self, id: &str) -> Option<&Series> {
        self.series.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> + '_ {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<Series> for SeriesSet {
    fn from_iter<I: IntoIterator<Item = Series>>(iter: I) -> Self {
        let mut set = SeriesSet::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}

/// Summary of one successfully loaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SeriesSummary {
    pub id: String,
    pub rows: usize,
    pub coverage: Coverage,
    pub gaps: Vec<i32>,
    pub has_latest: bool,
}

/// Load outcome for one file in a data directory
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SeriesFileStatus {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SeriesSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load and validate a single series file
pub fn load_series_file(path: &Path) -> Result<Series> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read series file: {}", path.display()))?;
    Series::from_json(&content).with_context(|| format!("failed to load {}", path.display()))
}

/// Load every `*.json` series file in a directory, skipping invalid files
pub fn load_series_dir(dir: &Path) -> Result<SeriesSet> {
    let (set, _) = load_series_dir_detailed(dir)?;
    Ok(set)
}

/// Load a data directory and report the outcome for every file
///
/// Files are parsed in parallel; results are merged in path order so the
/// returned set never depends on scheduling. When two files declare the same
/// id the first path wins.
pub fn load_series_dir_detailed(dir: &Path) -> Result<(SeriesSet, Vec<SeriesFileStatus>)> {
    let paths = collect_series_files(dir)?;

    let loaded: Vec<(PathBuf, Result<Series>)> = paths
        .into_par_iter()
        .map(|path| {
            let result = load_series_file(&path);
            (path, result)
        })
        .collect();

    let mut set = SeriesSet::new();
    let mut statuses = Vec::with_capacity(loaded.len());

    for (path, result) in loaded {
        match result {
            Ok(series) => {
                let gaps = series.coverage_gaps();
                if !gaps.is_empty() {
                    warn!(id = %series.id(), ?gaps, "series has coverage gaps");
                }
                let summary = SeriesSummary {
                    id: series.id().to_string(),
                    rows: series.observations().len(),
                    coverage: series.meta().coverage,
                    gaps,
                    has_latest: series.latest().is_some(),
                };
                if set.get(series.id()).is_some() {
                    warn!(id = %series.id(), path = %path.display(), "duplicate series id; keeping the first file");
                    statuses.push(SeriesFileStatus {
                        path,
                        summary: None,
                        error: Some(format!("duplicate series id {:?}", summary.id)),
                    });
                    continue;
                }
                debug!(id = %series.id(), rows = summary.rows, "loaded series");
                set.insert(series);
                statuses.push(SeriesFileStatus {
                    path,
                    summary: Some(summary),
                    error: None,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), "skipping series file: {:#}", e);
                statuses.push(SeriesFileStatus {
                    path,
                    summary: None,
                    error: Some(format!("{:#}", e)),
                });
            }
        }
    }

    Ok((set, statuses))
}

fn collect_series_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry_result in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory: {}", dir.display()))?
    {
        let entry = entry_result?;
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }

    // Sort files for deterministic order
    files.sort();
    Ok(files)
}
