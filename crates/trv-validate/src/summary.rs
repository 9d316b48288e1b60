//! Run summary: per-check tallies plus run-level counters.

use std::fmt;

use serde::Serialize;
use trv_layout::{Check, CheckState, Discrepancy, ParsedLayout};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub check: Check,
    pub passed: usize,
    pub failed: usize,
    /// Evaluated orders; excluded orders are not counted.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// One entry per check, in check order.
    pub checks: Vec<CheckTally>,
    pub groups_total: usize,
    pub empty_groups: usize,
    pub orders_total: usize,
    pub orders_evaluated: usize,
    pub orders_excluded_by_prefilter: usize,
    pub unique_identifiers: usize,
    pub identifiers_not_found: usize,
    pub lookup_calls: usize,
    pub reference_source: String,
    pub reference_unavailable: bool,
    pub prefilter_applied: bool,
    pub discrepancies: Vec<Discrepancy>,
}

impl RunSummary {
    /// Tally the outcome vectors currently recorded on `layout`.
    ///
    /// Counters the layout cannot know (lookups, source state) start at zero
    /// and are filled in by the validator.
    pub fn from_layout(layout: &ParsedLayout) -> Self {
        let mut checks: Vec<CheckTally> = Check::ALL
            .iter()
            .map(|c| CheckTally {
                check: *c,
                passed: 0,
                failed: 0,
                total: 0,
            })
            .collect();

        let mut evaluated = 0usize;
        for order in layout.orders() {
            if !order.outcome.is_complete() {
                continue;
            }
            evaluated += 1;
            for tally in checks.iter_mut() {
                tally.total += 1;
                match order.outcome.state(tally.check) {
                    CheckState::Passed => tally.passed += 1,
                    CheckState::Failed => tally.failed += 1,
                    CheckState::Unset => {}
                }
            }
        }

        let orders_total = layout.order_count();
        RunSummary {
            checks,
            groups_total: layout.groups.len(),
            empty_groups: layout.empty_group_count(),
            orders_total,
            orders_evaluated: evaluated,
            orders_excluded_by_prefilter: orders_total - evaluated,
            unique_identifiers: 0,
            identifiers_not_found: 0,
            lookup_calls: 0,
            reference_source: String::new(),
            reference_unavailable: false,
            prefilter_applied: false,
            discrepancies: layout.discrepancies.clone(),
        }
    }

    pub fn tally(&self, check: Check) -> &CheckTally {
        &self.checks[check.index()]
    }

    /// True when every evaluated order passed every check.
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|t| t.failed == 0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RunSummary {{")?;
        for t in &self.checks {
            writeln!(
                f,
                "  check{} {}: passed={} failed={} total={}",
                t.check.number(),
                t.check.as_str(),
                t.passed,
                t.failed,
                t.total
            )?;
        }
        writeln!(f, "  groups: {} (empty: {})", self.groups_total, self.empty_groups)?;
        writeln!(
            f,
            "  orders: {} (evaluated: {}, excluded_by_prefilter: {})",
            self.orders_total, self.orders_evaluated, self.orders_excluded_by_prefilter
        )?;
        writeln!(
            f,
            "  identifiers: {} (not_found: {}, lookups: {})",
            self.unique_identifiers, self.identifiers_not_found, self.lookup_calls
        )?;
        writeln!(
            f,
            "  reference: {} unavailable={}",
            self.reference_source, self.reference_unavailable
        )?;
        writeln!(f, "  prefilter_applied: {}", self.prefilter_applied)?;
        writeln!(f, "  discrepancies: {}", self.discrepancies.len())?;
        for d in &self.discrepancies {
            writeln!(f, "    {d}")?;
        }
        write!(f, "}}")
    }
}
