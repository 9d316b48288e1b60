//! Optional pre-filter boundary.
//!
//! A pre-filter narrows the parsed orders to those eligible for validation.
//! Its failure never stops a run: the validator falls back to every order.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::{info, warn};
use trv_layout::ParsedLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreFilterError {
    /// Backing store unreachable (connect failure, missing credentials).
    Unavailable(String),
    /// Store reachable but the query failed.
    Query(String),
}

impl fmt::Display for PreFilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreFilterError::Unavailable(msg) => write!(f, "pre-filter unavailable: {msg}"),
            PreFilterError::Query(msg) => write!(f, "pre-filter query failed: {msg}"),
        }
    }
}

impl std::error::Error for PreFilterError {}

#[async_trait::async_trait]
pub trait OrderPreFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Row indices (0-based, see `OrderRecord::row`) of the eligible orders.
    async fn eligible_rows(&self, layout: &ParsedLayout) -> Result<BTreeSet<usize>, PreFilterError>;
}

/// Which orders the validator evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Eligibility {
    #[default]
    All,
    Rows(BTreeSet<usize>),
}

impl Eligibility {
    pub fn allows(&self, row: usize) -> bool {
        match self {
            Eligibility::All => true,
            Eligibility::Rows(rows) => rows.contains(&row),
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, Eligibility::Rows(_))
    }
}

/// Run `filter` if given. Any error is logged once and yields [`Eligibility::All`].
pub async fn apply_prefilter(
    filter: Option<&dyn OrderPreFilter>,
    layout: &ParsedLayout,
) -> Eligibility {
    let Some(filter) = filter else {
        return Eligibility::All;
    };

    match filter.eligible_rows(layout).await {
        Ok(rows) => {
            info!(
                prefilter = filter.name(),
                eligible = rows.len(),
                orders = layout.order_count(),
                "pre-filter applied"
            );
            Eligibility::Rows(rows)
        }
        Err(e) => {
            warn!(prefilter = filter.name(), error = %e, "pre-filter unavailable; validating all orders");
            Eligibility::All
        }
    }
}

/// Eligibility rule shared by status-backed pre-filters.
///
/// An order is eligible when its status is one of `eligible_statuses`, when it
/// has no order number, or when its order number has no known status.
pub fn eligible_rows_by_status(
    layout: &ParsedLayout,
    statuses: &HashMap<String, String>,
    eligible_statuses: &[String],
) -> BTreeSet<usize> {
    layout
        .orders()
        .filter(|o| {
            let Some(num) = o.order_number.as_deref() else {
                return true;
            };
            match statuses.get(num) {
                Some(status) => eligible_statuses
                    .iter()
                    .any(|s| s.trim().eq_ignore_ascii_case(status.trim())),
                None => true,
            }
        })
        .map(|o| o.row)
        .collect()
}
