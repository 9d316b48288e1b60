//! Typed view of a single cell.
//!
//! Spreadsheet cells reach the validator in three shapes: structured date/time
//! values (typed spreadsheet readers), text, and spreadsheet-native numbers
//! (serial dates, day fractions). [`CellValue`] names all of them so the
//! date/time normalization in `trv-validate` can branch in one place.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Classify raw delimited-text input.
    ///
    /// Blank becomes `Empty`; a finite decimal (`.` or a single `,` as the
    /// decimal separator) becomes `Number`; anything else is `Text` (trimmed).
    /// Structured variants are never produced from text.
    pub fn from_raw(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() {
            return CellValue::Empty;
        }
        match parse_decimal(t) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(t.to_string()),
        }
    }

    /// Classify a raw execution-time cell.
    ///
    /// Only a day fraction in `[0, 1)` is a numeric time. Any other decimal
    /// (`10.30` in HH.MM style) stays `Text` so the time parser sees the
    /// digits as written instead of a float.
    pub fn from_raw_time(raw: &str) -> Self {
        match Self::from_raw(raw) {
            CellValue::Number(n) if !(0.0..1.0).contains(&n) => CellValue::Text(raw.trim().to_string()),
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

fn parse_decimal(t: &str) -> Option<f64> {
    let starts_ok = t
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
        .unwrap_or(false);
    if !starts_ok {
        // Keeps "inf", "NaN" and friends out of the numeric branch.
        return None;
    }
    let normalized = if t.matches(',').count() == 1 && !t.contains('.') {
        t.replace(',', ".")
    } else {
        t.to_string()
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_empty() {
        assert_eq!(CellValue::from_raw(""), CellValue::Empty);
        assert_eq!(CellValue::from_raw("   "), CellValue::Empty);
        assert!(CellValue::from_raw(" ").is_empty());
    }

    #[test]
    fn serial_numbers_are_numeric() {
        assert_eq!(CellValue::from_raw("45292"), CellValue::Number(45292.0));
        assert_eq!(CellValue::from_raw("0.5"), CellValue::Number(0.5));
        assert_eq!(CellValue::from_raw("45292,75"), CellValue::Number(45292.75));
    }

    #[test]
    fn dates_and_words_are_text() {
        assert_eq!(
            CellValue::from_raw(" 15/09/2025 "),
            CellValue::Text("15/09/2025".to_string())
        );
        assert_eq!(CellValue::from_raw("10:30:00"), CellValue::Text("10:30:00".to_string()));
        assert_eq!(CellValue::from_raw("NaN"), CellValue::Text("NaN".to_string()));
        assert_eq!(CellValue::from_raw("inf"), CellValue::Text("inf".to_string()));
    }

    #[test]
    fn time_cells_keep_clock_text() {
        assert_eq!(CellValue::from_raw_time("10.30"), CellValue::Text("10.30".to_string()));
        assert_eq!(CellValue::from_raw_time(" 9,05 "), CellValue::Text("9,05".to_string()));
        assert_eq!(CellValue::from_raw_time("0,4375"), CellValue::Number(0.4375));
        assert_eq!(CellValue::from_raw_time("0"), CellValue::Number(0.0));
        assert_eq!(CellValue::from_raw_time(""), CellValue::Empty);
        assert_eq!(CellValue::from_raw_time("10:30"), CellValue::Text("10:30".to_string()));
    }

    #[test]
    fn dotted_time_is_not_a_number() {
        // "10.03.56" has two dots and must stay text for the time parser.
        assert_eq!(CellValue::from_raw("10.03.56"), CellValue::Text("10.03.56".to_string()));
    }
}
