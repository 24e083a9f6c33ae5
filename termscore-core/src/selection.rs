//! Comparison selections
//!
//! A selection is either one administration term or a party aggregate.
//! Every party-vs-term branch in the engine goes through this type.

use crate::party::aggregate_party;
use crate::range_change::{baseline_range_change, simple_range_change};
use crate::registry::{Party, TermRegistry, PARTY_PREFIX};
use crate::series::YearMap;
use crate::term_series::{build_term_series, term_years, TermSeries};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// First year covered by the built-in party aggregates' labels
const PARTY_SINCE: i32 = 1980;

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selection {
    Term(String),
    Party(Party),
}

impl Selection {
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Display label, falling back to the raw id for unknown terms
    pub fn label(&self, registry: &TermRegistry) -> String {
        match self {
            Selection::Term(id) => registry
                .entry(id)
                .map(|e| e.label.clone())
                .unwrap_or_else(|| id.clone()),
            Selection::Party(party) => {
                format!("{} ({}-present)", party.plural_name(), PARTY_SINCE)
            }
        }
    }

    /// Label without the trailing year span
    pub fn short_label(&self, registry: &TermRegistry) -> String {
        match self {
            Selection::Term(id) => registry
                .term(id)
                .map(|t| t.short_label().to_string())
                .unwrap_or_else(|| id.clone()),
            Selection::Party(party) => party.plural_name().to_string(),
        }
    }

    pub fn party(&self, registry: &TermRegistry) -> Option<Party> {
        match self {
            Selection::Term(id) => registry.entry(id).map(|e| e.party),
            Selection::Party(party) => Some(*party),
        }
    }

    /// Calendar years for a term; party aggregates have none
    pub fn years(&self, registry: &TermRegistry) -> Vec<i32> {
        match self {
            Selection::Term(id) => term_years(registry, id),
            Selection::Party(_) => Vec::new(),
        }
    }

    /// Whether the selection resolves to at least one registry term
    pub fn is_known(&self, registry: &TermRegistry) -> bool {
        match self {
            Selection::Term(id) => registry.term(id).is_some(),
            Selection::Party(party) => !registry.terms_of_party(*party).is_empty(),
        }
    }

    pub fn term_series(&self, registry: &TermRegistry, map: &YearMap) -> TermSeries {
        match self {
            Selection::Term(id) => build_term_series(registry, id, map),
            Selection::Party(party) => aggregate_party(registry, *party, map),
        }
    }

    /// Range change over the raw-level map
    pub fn range_change(&self, registry: &TermRegistry, levels: &YearMap) -> Option<f64> {
        match self {
            Selection::Term(id) => baseline_range_change(registry, id, levels),
            Selection::Party(party) => {
                simple_range_change(&aggregate_party(registry, *party, levels))
            }
        }
    }
}

impl FromStr for Selection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let party = s
            .strip_prefix(PARTY_PREFIX)
            .and_then(Party::from_symbol);
        Ok(match party {
            Some(party) => Selection::Party(party),
            None => Selection::Term(s.to_string()),
        })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Term(id) => write!(f, "{}", id),
            Selection::Party(party) => write!(f, "{}{}", PARTY_PREFIX, party.symbol()),
        }
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.parse::<Selection>() {
            Ok(selection) => Ok(selection),
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selection {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_party_and_term_keys() {
        assert_eq!(sel("party-R"), Selection::Party(Party::Republican));
        assert_eq!(sel("party-D"), Selection::Party(Party::Democratic));
        assert_eq!(sel("obama-1"), Selection::Term("obama-1".to_string()));
        assert_eq!(sel("party-X"), Selection::Term("party-X".to_string()));
        assert_eq!(sel("party-D").to_string(), "party-D");
    }

    #[test]
    fn test_labels() {
        let registry = TermRegistry::builtin();
        assert_eq!(sel("party-R").label(&registry), "Republicans (1980-present)");
        assert_eq!(sel("obama-2").label(&registry), "Obama (2013–2017)");
        assert_eq!(sel("obama-2").short_label(&registry), "Obama");
        assert_eq!(sel("nobody").label(&registry), "nobody");
    }

    #[test]
    fn test_unknown_term_is_empty_not_error() {
        let registry = TermRegistry::builtin();
        let levels: YearMap = [(2000, 1.0), (2001, 2.0)].into_iter().collect();
        let unknown = sel("nobody-1");
        assert!(!unknown.is_known(&registry));
        assert!(unknown.term_series(&registry, &levels).is_empty());
        assert_eq!(unknown.range_change(&registry, &levels), None);
    }

    #[test]
    fn test_party_uses_simple_change() {
        let registry = TermRegistry::builtin();
        // Biden only: 2021 = 100, 2024 = 120, no 2020 baseline
        let levels: YearMap = [(2021, 100.0), (2024, 120.0)].into_iter().collect();
        assert_eq!(sel("biden-1").range_change(&registry, &levels), None);
        let change = sel("party-D").range_change(&registry, &levels).unwrap();
        assert!((change - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&sel("party-R")).unwrap();
        assert_eq!(json, "\"party-R\"");
        let back: Selection = serde_json::from_str("\"trump-1\"").unwrap();
        assert_eq!(back, sel("trump-1"));
    }
}
