//! Market code normalization.
//!
//! Venue cells carry a MIC optionally followed by a qualifier in parentheses,
//! e.g. `"MTAA(MTA)"` or `"XOFF (OTC)"`. Only the MIC takes part in matching.

/// Strip every parenthesised qualifier (and the parentheses) from `raw`, then
/// trim. Absent or blank input yields `""`.
///
/// Idempotent: `normalize_venue(Some(&normalize_venue(x))) == normalize_venue(x)`.
/// An unbalanced `(` drops the rest of the string; a stray `)` is dropped.
pub fn normalize_venue(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let mut out = String::with_capacity(raw.len());
    let mut depth: usize = 0;
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Case-insensitive match against the off-venue sentinel.
pub fn is_off_venue(normalized: &str, sentinel: &str) -> bool {
    normalized.eq_ignore_ascii_case(sentinel)
}
