//! Winner and scorecard engine
//!
//! Global invariants enforced:
//! - A missing or non-finite range change on either side means no winner
//! - Exact ties mean no winner
//! - Each metric lands in at most one side's list
//! - Swapping the sides and reversing directionality swaps the winner

use serde::{Deserialize, Serialize};

/// Whether lower or higher values are favorable; fixed per metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directionality {
    LowerIsBetter,
    HigherIsBetter,
}

impl Directionality {
    pub fn reversed(self) -> Self {
        match self {
            Directionality::LowerIsBetter => Directionality::HigherIsBetter,
            Directionality::HigherIsBetter => Directionality::LowerIsBetter,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Directionality::LowerIsBetter => "lower",
            Directionality::HigherIsBetter => "higher",
        }
    }
}

/// Winning side of a metric, or of the whole comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
    #[serde(rename = "none")]
    None,
}

impl Side {
    pub fn swapped(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
            Side::None => Side::None,
        }
    }
}

/// Decide the winner of one metric
pub fn decide_winner(a: Option<f64>, b: Option<f64>, directionality: Directionality) -> Side {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) if a.is_finite() && b.is_finite() => (a, b),
        _ => return Side::None,
    };
    if a == b {
        return Side::None;
    }
    let a_better = match directionality {
        Directionality::LowerIsBetter => a < b,
        Directionality::HigherIsBetter => a > b,
    };
    if a_better {
        Side::A
    } else {
        Side::B
    }
}

/// Range changes and winner for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonResult {
    pub metric: String,
    pub range_change_a: Option<f64>,
    pub range_change_b: Option<f64>,
    pub winner_side: Side,
}

impl ComparisonResult {
    pub fn new(
        metric: impl Into<String>,
        range_change_a: Option<f64>,
        range_change_b: Option<f64>,
        directionality: Directionality,
    ) -> Self {
        ComparisonResult {
            metric: metric.into(),
            range_change_a,
            range_change_b,
            winner_side: decide_winner(range_change_a, range_change_b, directionality),
        }
    }
}

/// Win tally across all metrics; derived, never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Scorecard {
    pub wins_a: usize,
    pub wins_b: usize,
    pub metrics_a: Vec<String>,
    pub metrics_b: Vec<String>,
}

impl Scorecard {
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a ComparisonResult>) -> Self {
        let mut card = Scorecard::default();
        for result in results {
            match result.winner_side {
                Side::A => card.metrics_a.push(result.metric.clone()),
                Side::B => card.metrics_b.push(result.metric.clone()),
                Side::None => {}
            }
        }
        card.wins_a = card.metrics_a.len();
        card.wins_b = card.metrics_b.len();
        card
    }

    /// Side with strictly more wins
    pub fn overall_winner(&self) -> Side {
        match self.wins_a.cmp(&self.wins_b) {
            std::cmp::Ordering::Greater => Side::A,
            std::cmp::Ordering::Less => Side::B,
            std::cmp::Ordering::Equal => Side::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_is_better() {
        let d = Directionality::LowerIsBetter;
        assert_eq!(decide_winner(Some(3.0), Some(3.0), d), Side::None);
        assert_eq!(decide_winner(Some(2.0), Some(3.0), d), Side::A);
        assert_eq!(decide_winner(Some(-1.0), Some(-4.0), d), Side::B);
    }

    #[test]
    fn test_higher_is_better() {
        let d = Directionality::HigherIsBetter;
        assert_eq!(decide_winner(Some(2.0), Some(3.0), d), Side::B);
        assert_eq!(decide_winner(Some(5.0), Some(3.0), d), Side::A);
    }

    #[test]
    fn test_missing_or_non_finite_means_none() {
        let d = Directionality::HigherIsBetter;
        assert_eq!(decide_winner(None, Some(3.0), d), Side::None);
        assert_eq!(decide_winner(Some(3.0), None, d), Side::None);
        assert_eq!(decide_winner(Some(f64::NAN), Some(3.0), d), Side::None);
        assert_eq!(decide_winner(Some(f64::INFINITY), Some(3.0), d), Side::None);
    }

    #[test]
    fn test_tally_and_overall() {
        let results = vec![
            ComparisonResult::new("cpi", Some(2.0), Some(3.0), Directionality::LowerIsBetter),
            ComparisonResult::new("gdp", Some(2.0), Some(3.0), Directionality::HigherIsBetter),
            ComparisonResult::new("wages", Some(4.0), Some(3.0), Directionality::HigherIsBetter),
            ComparisonResult::new("sp500", None, Some(3.0), Directionality::HigherIsBetter),
        ];
        let card = Scorecard::tally(&results);
        assert_eq!(card.wins_a, 2);
        assert_eq!(card.wins_b, 1);
        assert_eq!(card.metrics_a, vec!["cpi", "wages"]);
        assert_eq!(card.metrics_b, vec!["gdp"]);
        assert_eq!(card.overall_winner(), Side::A);
    }

    #[test]
    fn test_tied_scorecard_has_no_overall_winner() {
        assert_eq!(Scorecard::default().overall_winner(), Side::None);
    }

    #[test]
    fn test_side_serializes_lowercase_none() {
        assert_eq!(serde_json::to_string(&Side::None).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&Side::A).unwrap(), "\"A\"");
        assert_eq!(
            serde_json::to_string(&Directionality::LowerIsBetter).unwrap(),
            "\"lower_is_better\""
        );
    }
}
