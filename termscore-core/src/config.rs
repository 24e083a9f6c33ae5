//! Configuration file support for termscore
//!
//! Loads comparison settings from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.termscorerc.json` in the working directory
//! 3. `termscore.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.
//! Relative `data_dir` and `registry` paths resolve against the directory of
//! the config file they appear in.

use crate::metrics::MetricCatalog;
use crate::normalize::MAX_EXTRAPOLATION_YEARS;
use crate::registry::TermRegistry;
use crate::scorecard::Directionality;
use crate::selection::Selection;
use crate::series::LatestPartial;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SELECTION_A: &str = "trump-1";
const DEFAULT_SELECTION_B: &str = "biden-1";

/// termscore configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermscoreConfig {
    /// Directory of per-metric series files (default: `data`)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Registry JSON replacing the built-in administrations
    #[serde(default)]
    pub registry: Option<PathBuf>,

    /// Glob patterns over metric ids to compare (default: all)
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns over metric ids to skip
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Whether latest partial rows stand in for missing years (default: include)
    #[serde(default)]
    pub latest_partial: Option<LatestPartial>,

    /// Per-metric directionality overrides
    #[serde(default)]
    pub directionality: BTreeMap<String, Directionality>,

    /// Trailing extrapolation limit for `normalize` (0..=2, default 2)
    #[serde(default)]
    pub max_extrapolation_years: Option<u32>,

    /// Selections compared when none are given on the command line
    #[serde(default)]
    pub default_selections: Option<DefaultSelections>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultSelections {
    pub a: Option<String>,
    pub b: Option<String>,
}

/// Resolved configuration with compiled glob patterns
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Compiled include patterns (None means include all)
    pub include: Option<GlobSet>,
    /// Compiled exclude patterns (None means exclude nothing)
    pub exclude: Option<GlobSet>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub data_dir: PathBuf,
    pub registry: Option<PathBuf>,
    pub latest_partial: LatestPartial,
    pub directionality: BTreeMap<String, Directionality>,
    pub max_extrapolation_years: u32,
    pub default_a: Selection,
    pub default_b: Selection,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

/// Serializable view of a resolved config, for `config show`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfigSummary {
    pub config_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub registry: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub latest_partial: LatestPartial,
    pub directionality: BTreeMap<String, Directionality>,
    pub max_extrapolation_years: u32,
    pub default_a: Selection,
    pub default_b: Selection,
}

impl TermscoreConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(years) = self.max_extrapolation_years {
            if years > MAX_EXTRAPOLATION_YEARS {
                anyhow::bail!(
                    "max_extrapolation_years must be at most {} (got {})",
                    MAX_EXTRAPOLATION_YEARS,
                    years
                );
            }
        }

        for id in self.directionality.keys() {
            if id.trim().is_empty() {
                anyhow::bail!("directionality keys must be non-empty metric ids");
            }
        }

        if let Some(ref d) = self.default_selections {
            for (side, value) in [("a", &d.a), ("b", &d.b)] {
                if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                    anyhow::bail!("default_selections.{} must not be empty", side);
                }
            }
        }

        if let Some(ref dir) = self.data_dir {
            if dir.as_os_str().is_empty() {
                anyhow::bail!("data_dir must not be empty");
            }
        }

        // Validate glob patterns compile
        for pattern in &self.include {
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        }
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Resolve config into compiled form, anchoring relative paths at `base_dir`
    pub fn resolve(&self, base_dir: &Path) -> Result<ResolvedConfig> {
        self.validate()?;

        let include = compile_globs(&self.include)?;
        let exclude = compile_globs(&self.exclude)?;

        let anchor = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };

        let data_dir = anchor(
            self.data_dir
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_DATA_DIR)),
        );
        let registry = self.registry.as_deref().map(anchor);

        let defaults = self.default_selections.clone().unwrap_or_default();
        let parse = |value: Option<String>, fallback: &str| -> Selection {
            match value.unwrap_or_else(|| fallback.to_string()).parse() {
                Ok(selection) => selection,
                Err(never) => match never {},
            }
        };

        Ok(ResolvedConfig {
            include,
            exclude,
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
            data_dir,
            registry,
            latest_partial: self.latest_partial.unwrap_or_default(),
            directionality: self.directionality.clone(),
            max_extrapolation_years: self
                .max_extrapolation_years
                .unwrap_or(MAX_EXTRAPOLATION_YEARS),
            default_a: parse(defaults.a, DEFAULT_SELECTION_A),
            default_b: parse(defaults.b, DEFAULT_SELECTION_B),
            config_path: None,
        })
    }
}

fn compile_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

impl ResolvedConfig {
    /// Check if a metric id passes the include/exclude patterns
    pub fn should_include_metric(&self, id: &str) -> bool {
        // Check exclude first
        if let Some(ref exclude) = self.exclude {
            if exclude.is_match(id) {
                return false;
            }
        }

        // If include patterns exist, id must match at least one
        if let Some(ref include) = self.include {
            return include.is_match(id);
        }

        true
    }

    /// Built-in catalog with overrides and filters applied
    pub fn catalog(&self) -> MetricCatalog {
        MetricCatalog::builtin()
            .with_directionality(&self.directionality)
            .filtered(|id| self.should_include_metric(id))
    }

    /// Configured registry file, or the built-in registry
    pub fn load_registry(&self) -> Result<TermRegistry> {
        match &self.registry {
            Some(path) => TermRegistry::load(path),
            None => Ok(TermRegistry::builtin()),
        }
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            config_path: self.config_path.clone(),
            data_dir: self.data_dir.clone(),
            registry: self.registry.clone(),
            include: self.include_patterns.clone(),
            exclude: self.exclude_patterns.clone(),
            latest_partial: self.latest_partial,
            directionality: self.directionality.clone(),
            max_extrapolation_years: self.max_extrapolation_years,
            default_a: self.default_a.clone(),
            default_b: self.default_b.clone(),
        }
    }

    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        TermscoreConfig::default().resolve(Path::new("."))
    }
}

/// Discover and load a config file from the working directory
///
/// Search order:
/// 1. `.termscorerc.json`
/// 2. `termscore.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(root: &Path) -> Result<Option<(TermscoreConfig, PathBuf)>> {
    for name in [".termscorerc.json", "termscore.config.json"] {
        let path = root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<TermscoreConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: TermscoreConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from `root`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(root)? {
            Some((config, path)) => (config, Some(path)),
            None => (TermscoreConfig::default(), None),
        }
    };

    let base_dir = source_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(root);
    let mut resolved = config.resolve(base_dir)?;
    resolved.config_path = source_path;
    Ok(resolved)
}
