//! Sequential validator.
//!
//! Two passes over the layout, both in source order:
//! 1. resolve every distinct identifier that owns an eligible order (one
//!    lookup each, through [`ReferenceCache`]);
//! 2. evaluate all four checks on every eligible order.
//!
//! Resolving first means a source outage anywhere in the run affects every
//! identifier the same way.

use std::collections::BTreeSet;

use chrono_tz::Tz;
use tracing::{debug, info};
use trv_config::ValidationSettings;
use trv_layout::{Check, OrderRecord, OutcomeVector, ParsedLayout};
use trv_reference::{normalize_venue, ReferenceFact, ReferenceLookup};

use crate::cache::ReferenceCache;
use crate::checks;
use crate::datetime::{normalize_exec_date, normalize_exec_instant};
use crate::prefilter::Eligibility;
use crate::summary::RunSummary;

pub struct Validator<'a> {
    lookup: &'a dyn ReferenceLookup,
    off_venue_sentinel: String,
    timezone: Tz,
}

impl<'a> Validator<'a> {
    pub fn new(lookup: &'a dyn ReferenceLookup, settings: &ValidationSettings) -> Self {
        Self {
            lookup,
            off_venue_sentinel: settings.off_venue_sentinel.clone(),
            timezone: settings.timezone,
        }
    }

    /// Validate every eligible order of `layout` in place and summarize.
    pub async fn run(&self, layout: &mut ParsedLayout, eligibility: &Eligibility) -> RunSummary {
        let mut cache = ReferenceCache::new(self.lookup);

        let mut identifiers: Vec<String> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for g in &layout.groups {
            if g.orders.iter().any(|o| eligibility.allows(o.row)) && seen.insert(g.identifier.as_str()) {
                identifiers.push(g.identifier.clone());
            }
        }

        for id in &identifiers {
            cache.prime(id).await;
        }

        for group in layout.groups.iter_mut() {
            let fact = cache.get(&group.identifier);
            for order in group.orders.iter_mut() {
                if !eligibility.allows(order.row) {
                    debug!(row = order.row + 1, "order excluded by pre-filter");
                    continue;
                }
                order.outcome = evaluate_order(order, fact, &self.off_venue_sentinel, self.timezone);
                if !order.outcome.failed_checks().is_empty() {
                    debug!(
                        identifier = %group.identifier,
                        row = order.row + 1,
                        failed = ?order.outcome.failed_checks(),
                        "order failed checks"
                    );
                }
            }
        }

        let mut summary = RunSummary::from_layout(layout);
        summary.unique_identifiers = identifiers.len();
        summary.identifiers_not_found = identifiers
            .iter()
            .filter(|id| cache.get(id).is_none())
            .count();
        summary.lookup_calls = cache.calls();
        summary.reference_source = self.lookup.source_name().to_string();
        summary.reference_unavailable = cache.is_unavailable();
        summary.prefilter_applied = eligibility.is_filtered();

        info!(
            orders = summary.orders_total,
            evaluated = summary.orders_evaluated,
            identifiers = summary.unique_identifiers,
            not_found = summary.identifiers_not_found,
            reference_unavailable = summary.reference_unavailable,
            "validation complete"
        );
        summary
    }
}

/// All four checks for one order. Pure in (`order`, `fact`).
///
/// Every check runs regardless of earlier results; execution fields come only
/// from `order`.
pub fn evaluate_order(
    order: &OrderRecord,
    fact: Option<&ReferenceFact>,
    off_venue_sentinel: &str,
    tz: Tz,
) -> OutcomeVector {
    let venue = normalize_venue(Some(&order.venue_raw));
    let off_venue = checks::venue_is_off(&venue, off_venue_sentinel);
    let venue_fact = checks::select_venue(&venue, off_venue, fact);

    let exec_instant = normalize_exec_instant(&order.exec_date, &order.exec_time).ok();
    let exec_date = normalize_exec_date(&order.exec_date).ok();

    let mut outcome = OutcomeVector::default();
    outcome.record(Check::IdentifierCensus, checks::identifier_census(fact));
    outcome.record(
        Check::TradingVenue,
        checks::trading_venue(&venue, off_venue, fact),
    );
    outcome.record(
        Check::DateApproval,
        checks::date_approval(exec_instant, venue_fact, tz),
    );
    outcome.record(
        Check::MaturityDate,
        checks::maturity_date(exec_date, venue_fact, tz),
    );
    outcome
}
