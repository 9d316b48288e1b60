//! trv-validate
//!
//! Sequential order validation: four checks per order against reference data,
//! with a per-run lookup cache and an optional pre-filter.
//!
//! Pure check logic lives in [`checks`] and [`datetime`]; [`Validator`] only
//! orchestrates lookups and writes outcome vectors.

pub mod cache;
pub mod checks;
pub mod datetime;
pub mod engine;
pub mod prefilter;
pub mod summary;

pub use cache::ReferenceCache;
pub use datetime::{normalize_exec_date, normalize_exec_instant, FieldParseError};
pub use engine::{evaluate_order, Validator};
pub use prefilter::{
    apply_prefilter, eligible_rows_by_status, Eligibility, OrderPreFilter, PreFilterError,
};
pub use summary::{CheckTally, RunSummary};
