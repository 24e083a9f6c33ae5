//! Metric catalog
//!
//! Each metric carries a directionality fixed before any data is read, and
//! the field shown in its per-term series. Range change always uses levels.

use crate::scorecard::Directionality;
use crate::series::ValueField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricDefinition {
    pub id: String,
    pub title: String,
    pub directionality: Directionality,
    pub display: ValueField,
}

impl MetricDefinition {
    pub fn new(
        id: &str,
        title: &str,
        directionality: Directionality,
        display: ValueField,
    ) -> Self {
        MetricDefinition {
            id: id.to_string(),
            title: title.to_string(),
            directionality,
            display,
        }
    }
}

const BUILTIN_METRICS: &[(&str, &str, Directionality, ValueField)] = &[
    ("cpi", "Inflation (CPI)", Directionality::LowerIsBetter, ValueField::Yoy),
    ("wages", "Real Wages", Directionality::HigherIsBetter, ValueField::Level),
    ("gas_prices", "Gas Prices", Directionality::LowerIsBetter, ValueField::Level),
    ("gdp", "Real GDP", Directionality::HigherIsBetter, ValueField::Level),
    ("unemployment", "Unemployment Rate", Directionality::LowerIsBetter, ValueField::Level),
    ("deficit", "Federal Deficit", Directionality::LowerIsBetter, ValueField::Level),
    ("debt_to_gdp", "Debt to GDP", Directionality::LowerIsBetter, ValueField::Level),
    ("household_income", "Household Income", Directionality::HigherIsBetter, ValueField::Level),
    ("income_gap", "Income Gap (P90/P50)", Directionality::LowerIsBetter, ValueField::Level),
    ("life_expectancy", "Life Expectancy", Directionality::HigherIsBetter, ValueField::Level),
    ("homeownership", "Homeownership", Directionality::HigherIsBetter, ValueField::Level),
    ("sp500", "S&P 500", Directionality::HigherIsBetter, ValueField::Level),
];

/// Ordered list of metrics to compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCatalog {
    metrics: Vec<MetricDefinition>,
}

impl MetricCatalog {
    /// The twelve built-in statistics, in dashboard order
    pub fn builtin() -> Self {
        let metrics = BUILTIN_METRICS
            .iter()
            .map(|(id, title, dir, display)| MetricDefinition::new(id, title, *dir, *display))
            .collect();
        MetricCatalog { metrics }
    }

    pub fn new(metrics: Vec<MetricDefinition>) -> Self {
        MetricCatalog { metrics }
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn get(&self, id: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Apply per-metric directionality overrides; unknown ids are logged
    pub fn with_directionality(mut self, overrides: &BTreeMap<String, Directionality>) -> Self {
        for (id, dir) in overrides {
            match self.metrics.iter_mut().find(|m| &m.id == id) {
                Some(metric) => metric.directionality = *dir,
                None => warn!(metric = %id, "directionality override for unknown metric"),
            }
        }
        self
    }

    /// Keep only metrics whose id satisfies `keep`
    pub fn filtered<F: Fn(&str) -> bool>(mut self, keep: F) -> Self {
        self.metrics.retain(|m| keep(&m.id));
        self
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
