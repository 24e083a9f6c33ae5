//! Administration term registry
//!
//! Static table mapping an administration id to its party and an inclusive
//! calendar-year range of at most four years.
//!
//! Global invariants enforced:
//! - Registry is immutable once constructed (built once, passed by reference)
//! - Entry order is preserved exactly as declared
//! - A term needs both a registry entry and a year range; missing either
//!   degrades to "no such term", never an error at lookup time

use anyhow::{Context, Result};
use crate::series::{is_valid_year, MAX_YEAR, MIN_YEAR};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::warn;

/// Number of term-year slots in every term series
pub const TERM_SLOTS: usize = 4;

/// Selector prefix reserved for party aggregates
pub const PARTY_PREFIX: &str = "party-";

/// Political party of an administration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Party {
    #[serde(rename = "D")]
    Democratic,
    #[serde(rename = "R")]
    Republican,
}

impl Party {
    /// Single-letter symbol used in registry files and selector keys
    pub fn symbol(&self) -> &'static str {
        match self {
            Party::Democratic => "D",
            Party::Republican => "R",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Party> {
        match symbol {
            "D" | "d" => Some(Party::Democratic),
            "R" | "r" => Some(Party::Republican),
            _ => None,
        }
    }

    /// Plural display name ("Democrats", "Republicans")
    pub fn plural_name(&self) -> &'static str {
        match self {
            Party::Democratic => "Democrats",
            Party::Republican => "Republicans",
        }
    }

    pub fn all() -> [Party; 2] {
        [Party::Republican, Party::Democratic]
    }
}

/// One row of the ordered administration list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    pub value: String,
    pub label: String,
    pub party: Party,
}

/// A fully resolved term: registry entry joined with its year range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdministrationTerm {
    pub id: String,
    pub label: String,
    pub party: Party,
    pub start_year: i32,
    pub end_year: i32,
}

impl AdministrationTerm {
    /// Calendar years covered by the term, capped at `TERM_SLOTS`
    pub fn years(&self) -> Vec<i32> {
        (self.start_year..=self.end_year).take(TERM_SLOTS).collect()
    }

    /// Label with the trailing "(YYYY–YYYY)" span removed
    pub fn short_label(&self) -> &str {
        match self.label.rfind(" (") {
            Some(pos) if self.label.ends_with(')') => &self.label[..pos],
            _ => &self.label,
        }
    }
}

/// On-disk registry file shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryFile {
    #[serde(default)]
    pub administrations: Vec<RegistryEntry>,
    #[serde(default)]
    pub terms: BTreeMap<String, (i32, i32)>,
}

/// Ordered administration list plus the year-range table keyed by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRegistry {
    entries: Vec<RegistryEntry>,
    spans: BTreeMap<String, (i32, i32)>,
}

const BUILTIN_ENTRIES: &[(&str, &str, Party, i32, i32)] = &[
    ("trump-2", "Trump (2025-present)", Party::Republican, 2025, 2028),
    ("biden-1", "Biden (2021–2025)", Party::Democratic, 2021, 2024),
    ("trump-1", "Trump (2017–2021)", Party::Republican, 2017, 2020),
    ("obama-1", "Obama (2009–2013)", Party::Democratic, 2009, 2012),
    ("obama-2", "Obama (2013–2017)", Party::Democratic, 2013, 2016),
    ("gwbush-1", "George W. Bush (2001–2005)", Party::Republican, 2001, 2004),
    ("gwbush-2", "George W. Bush (2005–2009)", Party::Republican, 2005, 2008),
    ("clinton-1", "Clinton (1993–1997)", Party::Democratic, 1993, 1996),
    ("clinton-2", "Clinton (1997–2001)", Party::Democratic, 1997, 2000),
    ("ghwbush-1", "George H. W. Bush (1989–1993)", Party::Republican, 1989, 1992),
    ("reagan-1", "Reagan (1981–1985)", Party::Republican, 1981, 1984),
    ("reagan-2", "Reagan (1985–1989)", Party::Republican, 1985, 1988),
];

impl TermRegistry {
    /// Built-in registry of administrations since 1981
    pub fn builtin() -> Self {
        let entries = BUILTIN_ENTRIES
            .iter()
            .map(|(value, label, party, _, _)| RegistryEntry {
                value: value.to_string(),
                label: label.to_string(),
                party: *party,
            })
            .collect();
        let spans = BUILTIN_ENTRIES
            .iter()
            .map(|(value, _, _, start, end)| (value.to_string(), (*start, *end)))
            .collect();
        TermRegistry { entries, spans }
    }

    /// Build a registry from entries and spans, validating both
    pub fn new(entries: Vec<RegistryEntry>, spans: BTreeMap<String, (i32, i32)>) -> Result<Self> {
        validate(&entries, &spans)?;
        Ok(TermRegistry { entries, spans })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: RegistryFile =
            serde_json::from_str(json).context("failed to parse registry JSON")?;
        Self::new(file.administrations, file.terms)
    }

    /// Load a registry file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("invalid registry in: {}", path.display()))
    }

    pub fn to_file(&self) -> RegistryFile {
        RegistryFile {
            administrations: self.entries.clone(),
            terms: self.spans.clone(),
        }
    }

    /// Registry entries in declaration order
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.value == id)
    }

    /// Resolve a term by id; `None` if either the entry or its span is missing
    pub fn term(&self, id: &str) -> Option<AdministrationTerm> {
        let entry = self.entry(id)?;
        let (start_year, end_year) = *self.spans.get(id)?;
        Some(AdministrationTerm {
            id: entry.value.clone(),
            label: entry.label.clone(),
            party: entry.party,
            start_year,
            end_year,
        })
    }

    /// All resolvable terms of a party, in registry order
    pub fn terms_of_party(&self, party: Party) -> Vec<AdministrationTerm> {
        self.entries
            .iter()
            .filter(|e| e.party == party)
            .filter_map(|e| self.term(&e.value))
            .collect()
    }

    /// All resolvable terms, in registry order
    pub fn terms(&self) -> Vec<AdministrationTerm> {
        self.entries
            .iter()
            .filter_map(|e| self.term(&e.value))
            .collect()
    }
}

impl Default for TermRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn validate(entries: &[RegistryEntry], spans: &BTreeMap<String, (i32, i32)>) -> Result<()> {
    let id_pattern = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$")?;
    let mut seen = HashSet::new();

    for entry in entries {
        if !id_pattern.is_match(&entry.value) {
            anyhow::bail!("invalid administration id: {:?}", entry.value);
        }
        if entry.value.starts_with(PARTY_PREFIX) {
            anyhow::bail!(
                "administration id {:?} uses the reserved prefix {:?}",
                entry.value,
                PARTY_PREFIX
            );
        }
        if !seen.insert(entry.value.as_str()) {
            anyhow::bail!("duplicate administration id: {}", entry.value);
        }
        if !spans.contains_key(&entry.value) {
            warn!(id = %entry.value, "administration has no year range; its series will be empty");
        }
    }

    for (id, (start, end)) in spans {
        for year in [*start, *end] {
            if !is_valid_year(year) {
                anyhow::bail!(
                    "term {} year {} is outside {}..={}",
                    id,
                    year,
                    MIN_YEAR,
                    MAX_YEAR
                );
            }
        }
        let len = end.checked_sub(*start);
        if !len.is_some_and(|len| (0..TERM_SLOTS as i32).contains(&len)) {
            anyhow::bail!(
                "term {} spans {}..={}; a term covers one to {} calendar years",
                id,
                start,
                end,
                TERM_SLOTS
            );
        }
        if !seen.contains(id.as_str()) {
            warn!(id = %id, "year range has no matching administration entry; ignored");
        }
    }

    Ok(())
}
