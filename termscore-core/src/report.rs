//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering (catalog order for metrics, registry order for terms)
//! - Missing numbers render as a placeholder, never as 0, NaN, or infinity
//! - Byte-for-byte identical output across runs

use crate::compare::{Comparison, SelectionSummary};
use crate::registry::{Party, TermRegistry};
use crate::scorecard::Side;
use crate::selection::Selection;
use anyhow::{Context, Result};
use serde::Serialize;

/// Shown wherever a number is unavailable
pub const PLACEHOLDER: &str = "–";

/// Signed percentage with one decimal, or the placeholder
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.1}%", v),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Plain value with two decimals, or the placeholder
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => PLACEHOLDER.to_string(),
    }
}

fn side_name<'a>(side: Side, a: &'a SelectionSummary, b: &'a SelectionSummary) -> &'a str {
    match side {
        Side::A => &a.short_label,
        Side::B => &b.short_label,
        Side::None => PLACEHOLDER,
    }
}

/// Display title of a compared metric, falling back to its id
fn metric_title<'a>(comparison: &'a Comparison, id: &'a str) -> &'a str {
    comparison
        .metrics
        .iter()
        .find(|m| m.id == id)
        .map_or(id, |m| m.title.as_str())
}

/// Render a comparison as a text table plus scorecard
pub fn render_text(comparison: &Comparison) -> String {
    let a = &comparison.a;
    let b = &comparison.b;
    let mut output = String::new();

    output.push_str(&format!("A: {}\n", a.label));
    output.push_str(&format!("B: {}\n\n", b.label));

    output.push_str(&format!(
        "{:<24} {:>10} {:>10} {:<7} {}\n",
        "METRIC", "A CHANGE", "B CHANGE", "BETTER", "WINNER"
    ));

    for metric in &comparison.metrics {
        output.push_str(&format!(
            "{:<24} {:>10} {:>10} {:<7} {}\n",
            truncate_or_pad(&metric.title, 24),
            format_percent(metric.a.range_change),
            format_percent(metric.b.range_change),
            metric.directionality.short_name(),
            side_name(metric.winner, a, b),
        ));
    }

    let card = &comparison.scorecard;
    output.push_str(&format!(
        "\nScorecard: {} {}, {} {}\n",
        a.short_label, card.wins_a, b.short_label, card.wins_b
    ));
    for (summary, metrics) in [(a, &card.metrics_a), (b, &card.metrics_b)] {
        let list = if metrics.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            metrics
                .iter()
                .map(|id| metric_title(comparison, id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        output.push_str(&format!("  {}: {}\n", summary.short_label, list));
    }

    match comparison.overall_winner {
        Side::None => output.push_str("Overall: tie\n"),
        side => output.push_str(&format!("Overall: {}\n", side_name(side, a, b))),
    }

    output
}

/// Render a comparison as pretty JSON
pub fn render_json(comparison: &Comparison) -> Result<String> {
    serde_json::to_string_pretty(comparison).context("failed to serialize comparison")
}

/// One selectable key, as listed by `terms`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectableEntry {
    pub key: Selection,
    pub label: String,
    pub party: Party,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<(i32, i32)>,
}

/// Party aggregates first, then registry terms in declared order
pub fn selectable_entries(registry: &TermRegistry) -> Vec<SelectableEntry> {
    let parties = Party::all().into_iter().map(|party| {
        let key = Selection::Party(party);
        SelectableEntry {
            label: key.label(registry),
            key,
            party,
            years: None,
        }
    });
    let terms = registry.entries().iter().map(|entry| SelectableEntry {
        key: Selection::Term(entry.value.clone()),
        label: entry.label.clone(),
        party: entry.party,
        years: registry
            .term(&entry.value)
            .map(|t| (t.start_year, t.end_year)),
    });
    parties.chain(terms).collect()
}

pub fn render_terms_text(registry: &TermRegistry) -> String {
    let mut output = format!("{:<12} {:<6} {:<12} {}\n", "KEY", "PARTY", "YEARS", "LABEL");
    for entry in selectable_entries(registry) {
        let years = match entry.years {
            Some((start, end)) => format!("{}-{}", start, end),
            None => PLACEHOLDER.to_string(),
        };
        output.push_str(&format!(
            "{:<12} {:<6} {:<12} {}\n",
            entry.key.to_string(),
            entry.party.symbol(),
            years,
            entry.label
        ));
    }
    output
}

pub fn render_terms_json(registry: &TermRegistry) -> Result<String> {
    serde_json::to_string_pretty(&selectable_entries(registry))
        .context("failed to serialize registry")
}

/// Truncate or pad string to fixed width (in characters)
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
