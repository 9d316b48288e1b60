//! The four per-order checks as pure functions.
//!
//! Each takes only what it needs from the order and the reference fact, so
//! every check can be exercised without a layout or a lookup.

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use trv_reference::{is_off_venue, ReferenceFact, VenueFact};

/// An order is off-venue when its normalized code is the sentinel, or blank.
pub fn venue_is_off(normalized: &str, sentinel: &str) -> bool {
    normalized.is_empty() || is_off_venue(normalized, sentinel)
}

/// Venue fact used by Checks 3 and 4.
///
/// Listed venues match by MIC. Off-venue orders use the first venue the
/// source returned.
pub fn select_venue<'a>(
    normalized: &str,
    off_venue: bool,
    fact: Option<&'a ReferenceFact>,
) -> Option<&'a VenueFact> {
    let fact = fact?;
    if off_venue {
        fact.first_venue()
    } else {
        fact.venue(normalized)
    }
}

/// Check 1: identifier known to the reference source.
pub fn identifier_census(fact: Option<&ReferenceFact>) -> bool {
    fact.is_some()
}

/// Check 2: off-venue passes unconditionally; otherwise the MIC must be listed.
pub fn trading_venue(normalized: &str, off_venue: bool, fact: Option<&ReferenceFact>) -> bool {
    if off_venue {
        return true;
    }
    fact.map(|f| f.has_mic(normalized)).unwrap_or(false)
}

/// Check 3: executed at or after the venue approval instant.
///
/// Fails when the execution instant is missing or unparseable, and when the
/// venue carries no approval instant.
pub fn date_approval(exec: Option<NaiveDateTime>, venue: Option<&VenueFact>, tz: Tz) -> bool {
    let approval = venue.and_then(|v| v.approval_start);
    match (exec, approval) {
        (Some(exec), Some(approval)) => exec >= approval.with_timezone(&tz).naive_local(),
        _ => false,
    }
}

/// Check 4: executed on or before the venue maturity date.
///
/// No maturity means no constraint. A missing execution date cannot violate
/// the constraint either.
pub fn maturity_date(exec: Option<NaiveDate>, venue: Option<&VenueFact>, tz: Tz) -> bool {
    let maturity = venue.and_then(|v| v.maturity);
    match (exec, maturity) {
        (Some(exec), Some(maturity)) => exec <= maturity.with_timezone(&tz).date_naive(),
        _ => true,
    }
}
