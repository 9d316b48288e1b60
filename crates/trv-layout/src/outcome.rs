//! Per-order outcome vector: one tri-state flag per check.

use serde::{Deserialize, Serialize};

/// The four regulatory checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// Check 1: the instrument identifier is known to the reference source.
    IdentifierCensus,
    /// Check 2: the trading venue MIC is listed for the instrument.
    TradingVenue,
    /// Check 3: execution is at or after the venue approval instant.
    DateApproval,
    /// Check 4: execution is on or before the venue maturity date.
    MaturityDate,
}

impl Check {
    pub const ALL: [Check; 4] = [
        Check::IdentifierCensus,
        Check::TradingVenue,
        Check::DateApproval,
        Check::MaturityDate,
    ];

    pub fn index(self) -> usize {
        match self {
            Check::IdentifierCensus => 0,
            Check::TradingVenue => 1,
            Check::DateApproval => 2,
            Check::MaturityDate => 3,
        }
    }

    /// 1-based check number as used in operator-facing output.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Check::IdentifierCensus => "identifier_census",
            Check::TradingVenue => "trading_venue",
            Check::DateApproval => "date_approval",
            Check::MaturityDate => "maturity_date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Not evaluated (fresh record, or excluded by the pre-filter).
    #[default]
    Unset,
    Passed,
    Failed,
}

/// Four flags, written once each, strictly in [`Check::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeVector {
    flags: [CheckState; 4],
}

impl OutcomeVector {
    /// Record the result of `check`.
    ///
    /// Every earlier check must already be recorded and `check` itself must
    /// still be unset.
    pub fn record(&mut self, check: Check, passed: bool) {
        let i = check.index();
        debug_assert!(
            self.flags[..i].iter().all(|s| *s != CheckState::Unset),
            "check {} recorded before an earlier check",
            check.number()
        );
        debug_assert_eq!(
            self.flags[i],
            CheckState::Unset,
            "check {} recorded twice",
            check.number()
        );
        self.flags[i] = if passed {
            CheckState::Passed
        } else {
            CheckState::Failed
        };
    }

    pub fn state(&self, check: Check) -> CheckState {
        self.flags[check.index()]
    }

    pub fn is_failed(&self, check: Check) -> bool {
        self.state(check) == CheckState::Failed
    }

    /// True once all four checks have been recorded.
    pub fn is_complete(&self) -> bool {
        self.flags.iter().all(|s| *s != CheckState::Unset)
    }

    pub fn failed_checks(&self) -> Vec<Check> {
        Check::ALL
            .into_iter()
            .filter(|c| self.is_failed(*c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vector_is_unset() {
        let v = OutcomeVector::default();
        for c in Check::ALL {
            assert_eq!(v.state(c), CheckState::Unset);
        }
        assert!(!v.is_complete());
        assert!(v.failed_checks().is_empty());
    }

    #[test]
    fn records_in_order() {
        let mut v = OutcomeVector::default();
        v.record(Check::IdentifierCensus, false);
        v.record(Check::TradingVenue, true);
        v.record(Check::DateApproval, false);
        v.record(Check::MaturityDate, true);
        assert!(v.is_complete());
        assert_eq!(
            v.failed_checks(),
            vec![Check::IdentifierCensus, Check::DateApproval]
        );
    }

    #[test]
    #[should_panic(expected = "recorded twice")]
    #[cfg(debug_assertions)]
    fn double_record_is_caught_in_debug() {
        let mut v = OutcomeVector::default();
        v.record(Check::IdentifierCensus, true);
        v.record(Check::IdentifierCensus, true);
    }

    #[test]
    fn check_numbers_are_one_based() {
        let numbers: Vec<usize> = Check::ALL.iter().map(|c| c.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }
}
