//! termscore CLI - compare U.S. economic statistics across administrations and parties

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Logs go to stderr; stdout carries only the requested report

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use termscore_core::config::{self, ResolvedConfig};
use termscore_core::normalize::{
    normalize, AnnualRule, Backfill, Combine, CombineWith, NormalizeSpec, RawSeries, Splice,
};
use termscore_core::report::{render_terms_json, render_terms_text};
use termscore_core::series::{load_series_dir, load_series_dir_detailed, load_series_file};
use termscore_core::{
    compare, render_json, render_text, ComparisonContext, LatestPartial, Selection,
    TermRegistry,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "termscore")]
#[command(about = "Compare U.S. economic statistics across presidential terms and parties")]
#[command(version = env!("TERMSCORE_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); overrides TERMSCORE_LOG
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two selections (term ids or party-R / party-D) across all metrics
    Compare {
        /// First selection (default from config, else trump-1)
        a: Option<String>,

        /// Second selection (default from config, else biden-1)
        b: Option<String>,

        /// Directory of per-metric series files (overrides config file)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Registry JSON file (overrides config file)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Compare only these metric ids (repeatable)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Ignore latest partial-period rows
        #[arg(long)]
        exclude_latest: bool,
    },
    /// List selectable keys: party aggregates, then registry terms
    Terms {
        /// Registry JSON file (overrides config file)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate every series file in a data directory
    Validate {
        /// Directory of per-metric series files (overrides config file)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Normalize a raw observation file into an annual series file
    Normalize {
        /// Raw series JSON ({ meta, observations })
        #[arg(long)]
        input: PathBuf,

        /// How sub-annual observations become one annual value
        #[arg(long, default_value = "closing")]
        rule: RuleArg,

        /// First month of the fiscal year (monthly data only)
        #[arg(long)]
        fiscal_year_start: Option<u8>,

        /// Second raw series joined with the input before annualisation
        #[arg(long, requires = "combine")]
        combine_with: Option<PathBuf>,

        /// How the input and --combine-with are joined
        #[arg(long, requires = "combine_with")]
        combine: Option<CombineArg>,

        /// Raw series whose annual values fill years before the input's first year
        #[arg(long)]
        fallback: Option<PathBuf>,

        /// Normalized series whose growth is chained backward for backfill
        #[arg(long, requires = "backfill_to")]
        proxy: Option<PathBuf>,

        /// Earliest year to backfill to
        #[arg(long, requires = "proxy")]
        backfill_to: Option<i32>,

        /// Extrapolate trailing years up to this year (bounded)
        #[arg(long)]
        extrapolate_through: Option<i32>,

        /// Drop years before this one from the output (they still serve as yoy bases)
        #[arg(long)]
        output_from: Option<i32>,

        /// Do not emit annual rows after this year
        #[arg(long)]
        complete_through: Option<i32>,

        /// Do not emit a latest partial-period row
        #[arg(long)]
        no_latest: bool,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running a comparison
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum RuleArg {
    Closing,
    Mean,
    Sum,
}

impl From<RuleArg> for AnnualRule {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::Closing => AnnualRule::Closing,
            RuleArg::Mean => AnnualRule::Mean,
            RuleArg::Sum => AnnualRule::Sum,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CombineArg {
    Ratio,
    Deflate,
}

impl From<CombineArg> for Combine {
    fn from(method: CombineArg) -> Self {
        match method {
            CombineArg::Ratio => Combine::Ratio,
            CombineArg::Deflate => Combine::Deflate,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compare {
            a,
            b,
            data,
            registry,
            config: config_path,
            format,
            metrics,
            exclude_latest,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let registry = load_registry(registry.as_deref(), &resolved)?;

            let mut catalog = resolved.catalog();
            if !metrics.is_empty() {
                for id in &metrics {
                    if catalog.get(id).is_none() {
                        anyhow::bail!("unknown or excluded metric: {}", id);
                    }
                }
                catalog = catalog.filtered(|id| metrics.iter().any(|m| m == id));
            }

            let data_dir = data.unwrap_or_else(|| resolved.data_dir.clone());
            let series = load_series_dir(&data_dir)
                .with_context(|| format!("failed to load series from {}", data_dir.display()))?;
            info!(count = series.len(), dir = %data_dir.display(), "loaded series");

            let latest = if exclude_latest {
                LatestPartial::Exclude
            } else {
                resolved.latest_partial
            };

            let a = parse_selection(a, &resolved.default_a);
            let b = parse_selection(b, &resolved.default_b);
            for selection in [&a, &b] {
                if !selection.is_known(&registry) {
                    warn!(selection = %selection, "unknown selection; its side will be empty");
                }
            }

            let ctx = ComparisonContext {
                registry: &registry,
                catalog: &catalog,
                series: &series,
                latest,
            };
            let comparison = compare(&a, &b, &ctx);

            match format {
                OutputFormat::Text => print!("{}", render_text(&comparison)),
                OutputFormat::Json => println!("{}", render_json(&comparison)?),
            }
        }
        Commands::Terms {
            registry,
            config: config_path,
            format,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let registry = load_registry(registry.as_deref(), &resolved)?;
            match format {
                OutputFormat::Text => print!("{}", render_terms_text(&registry)),
                OutputFormat::Json => println!("{}", render_terms_json(&registry)?),
            }
        }
        Commands::Validate {
            data,
            config: config_path,
            format,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let data_dir = data.unwrap_or_else(|| resolved.data_dir.clone());
            let (_, statuses) = load_series_dir_detailed(&data_dir)
                .with_context(|| format!("failed to validate {}", data_dir.display()))?;
            let catalog = resolved.catalog();

            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&statuses)
                        .context("failed to serialize statuses")?;
                    println!("{}", json);
                }
                OutputFormat::Text => {
                    for status in &statuses {
                        let name = status
                            .path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| status.path.display().to_string());
                        match (&status.summary, &status.error) {
                            (Some(s), _) => {
                                let gaps = if s.gaps.is_empty() {
                                    "none".to_string()
                                } else {
                                    s.gaps
                                        .iter()
                                        .map(|y| y.to_string())
                                        .collect::<Vec<_>>()
                                        .join(",")
                                };
                                let known = if catalog.get(&s.id).is_some() {
                                    ""
                                } else {
                                    " (not in catalog)"
                                };
                                println!(
                                    "ok    {:<24} {}{} rows={} coverage={}-{} gaps={}{}",
                                    name,
                                    s.id,
                                    known,
                                    s.rows,
                                    s.coverage.start,
                                    s.coverage.end,
                                    gaps,
                                    if s.has_latest { " latest" } else { "" }
                                );
                            }
                            (None, Some(e)) => println!("FAIL  {:<24} {}", name, e),
                            (None, None) => println!("FAIL  {:<24} unknown error", name),
                        }
                    }
                }
            }

            let failures = statuses.iter().filter(|s| s.error.is_some()).count();
            if failures > 0 {
                eprintln!("{} of {} series files invalid", failures, statuses.len());
                std::process::exit(1);
            }
        }
        Commands::Normalize {
            input,
            rule,
            fiscal_year_start,
            combine_with,
            combine,
            fallback,
            proxy,
            backfill_to,
            extrapolate_through,
            output_from,
            complete_through,
            no_latest,
            output,
            config: config_path,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let raw = RawSeries::load(&input)?;

            let combine_with = match (combine_with, combine) {
                (Some(path), Some(method)) => Some(CombineWith {
                    other: RawSeries::load(&path)?,
                    method: method.into(),
                }),
                (None, None) => None,
                _ => anyhow::bail!("--combine-with and --combine must be given together"),
            };

            let splice = fallback
                .map(|path| RawSeries::load(&path).map(|fallback| Splice { fallback }))
                .transpose()?;

            let backfill = match (proxy, backfill_to) {
                (Some(path), Some(target_start)) => {
                    let proxy = load_series_file(&path)?;
                    Some(Backfill {
                        proxy_id: proxy.id().to_string(),
                        proxy: proxy.levels(LatestPartial::Exclude),
                        target_start,
                    })
                }
                (None, None) => None,
                _ => anyhow::bail!("--proxy and --backfill-to must be given together"),
            };

            let spec = NormalizeSpec {
                rule: rule.into(),
                fiscal_year_start_month: fiscal_year_start,
                combine_with,
                splice,
                backfill,
                extrapolate_through,
                max_extrapolation_years: resolved.max_extrapolation_years,
                output_from,
                complete_through,
                include_latest: !no_latest,
            };

            let series = normalize(&raw, &spec)?;
            let json = series.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{}\n", json))
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(id = %series.id(), path = %path.display(), "wrote series");
                }
                None => println!("{}", json),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let root = std::env::current_dir()?;
                match config::load_and_resolve(&root, path.as_deref()) {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path, format } => {
                let root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&root, path.as_deref())
                    .context("failed to load configuration")?;
                match format {
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::to_string_pretty(&resolved.summary())
                            .context("failed to serialize configuration")?
                    ),
                    OutputFormat::Text => print_config(&resolved),
                }
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("TERMSCORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let root = std::env::current_dir()?;
    let resolved =
        config::load_and_resolve(&root, config_path).context("failed to load configuration")?;
    if let Some(path) = &resolved.config_path {
        info!(path = %path.display(), "using config");
    }
    Ok(resolved)
}

fn load_registry(flag: Option<&Path>, resolved: &ResolvedConfig) -> anyhow::Result<TermRegistry> {
    match flag {
        Some(path) => TermRegistry::load(path),
        None => resolved.load_registry(),
    }
}

fn parse_selection(arg: Option<String>, fallback: &Selection) -> Selection {
    match arg {
        Some(s) => match s.parse() {
            Ok(selection) => selection,
            Err(never) => match never {},
        },
        None => fallback.clone(),
    }
}

fn print_config(resolved: &ResolvedConfig) {
    let list = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };

    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Data:");
    println!("  data_dir: {}", resolved.data_dir.display());
    println!(
        "  registry: {}",
        resolved
            .registry
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!(
        "  latest_partial: {}",
        match resolved.latest_partial {
            LatestPartial::Include => "include",
            LatestPartial::Exclude => "exclude",
        }
    );
    println!(
        "  max_extrapolation_years: {}",
        resolved.max_extrapolation_years
    );
    println!();
    println!("Metrics:");
    println!("  include: {}", list(&resolved.include_patterns));
    println!("  exclude: {}", list(&resolved.exclude_patterns));
    for (id, dir) in &resolved.directionality {
        println!("  {}: {}", id, dir.short_name());
    }
    println!();
    println!("Defaults:");
    println!("  a: {}", resolved.default_a);
    println!("  b: {}", resolved.default_b);
}
