//! termscore core library - economic metric normalization and term comparison

// Global invariants enforced in this crate:
// - Series are validated at load time and immutable afterwards
// - No global mutable state; registry and catalog are passed by reference
// - No randomness or clocks; the comparison engine is single-threaded
// - Degenerate inputs yield None / Side::None, never an error or a panic
// - Identical input yields byte-for-byte identical output

pub mod compare;
pub mod config;
pub mod metrics;
pub mod normalize;
pub mod party;
pub mod range_change;
pub mod registry;
pub mod report;
pub mod scorecard;
pub mod selection;
pub mod series;
pub mod term_series;

pub use compare::{compare, Comparison, ComparisonContext, MetricComparison, SideSummary};
pub use config::ResolvedConfig;
pub use metrics::{MetricCatalog, MetricDefinition};
pub use registry::{AdministrationTerm, Party, TermRegistry, TERM_SLOTS};
pub use report::{render_json, render_text};
pub use scorecard::{decide_winner, ComparisonResult, Directionality, Scorecard, Side};
pub use selection::Selection;
pub use series::{LatestPartial, Series, SeriesSet, YearMap};
pub use term_series::TermSeries;
