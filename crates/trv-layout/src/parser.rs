//! Layout parser: raw rows -> instrument groups with their orders.
//!
//! ## Layout contract
//!
//! | Rows                         | Treatment                                   |
//! |------------------------------|---------------------------------------------|
//! | preamble + column-header row | located in the first [`HEADER_SCAN_ROWS`] rows; passed through |
//! | identifier + occurrence count | group header (identifier matches [`is_identifier`]) |
//! | any other non-blank row      | order of the most recent group header       |
//! | blank row                    | separator; belongs to no group              |
//!
//! A non-blank row after the column header but before the first group header
//! is a structural error. Groups with zero orders are kept. A declared count
//! that differs from the parsed orders is a [`Discrepancy`], not an error.

use std::fmt;

use crate::cell::CellValue;
use crate::outcome::OutcomeVector;
use crate::table::RawTable;

/// How many leading rows are searched for the column-header row.
pub const HEADER_SCAN_ROWS: usize = 20;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structural errors. Any of these aborts the run before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// An I/O or CSV-library error.
    Io(String),
    /// No row within the scan window carries an identifier column.
    HeaderNotFound { scanned: usize },
    /// The column-header row lacks a required column.
    MissingColumn(&'static str),
    /// A data row appears before any group header. `row` is 1-based.
    OrphanOrderRow { row: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Io(msg) => write!(f, "layout io error: {msg}"),
            LayoutError::HeaderNotFound { scanned } => write!(
                f,
                "layout column-header row not found in the first {scanned} rows (expected an 'ISIN' column)"
            ),
            LayoutError::MissingColumn(col) => {
                write!(f, "layout missing required column: '{col}'")
            }
            LayoutError::OrphanOrderRow { row } => write!(
                f,
                "layout row {row}: order row without a preceding instrument header"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

// ---------------------------------------------------------------------------
// Column detection
// ---------------------------------------------------------------------------

/// 0-based column indices resolved from the column-header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub identifier: usize,
    pub occurrences: usize,
    pub venue: usize,
    pub exec_date: usize,
    pub exec_time: usize,
    pub order_number: Option<usize>,
}

fn norm_header(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

fn is_occurrences_header(h: &str) -> bool {
    h.contains("OCCORREN") || h.contains("OCCURRENCE")
}

fn is_venue_header(h: &str) -> bool {
    h.contains("MERCATO") || h.contains("VENUE")
}

fn is_exec_date_header(h: &str) -> bool {
    h == "DATA ESEGUITO" || h == "EXECUTION DATE" || h == "EXEC DATE"
}

fn is_exec_time_header(h: &str) -> bool {
    h == "ORA ESEGUITO" || h == "EXECUTION TIME" || h == "EXEC TIME"
}

fn is_order_number_header(h: &str) -> bool {
    (h.contains("NUMERO") && h.contains("ORDINE"))
        || h.contains("ORDER NUMBER")
        || matches!(h, "NUMORD" | "NUM_ORD" | "ORDER_NUM")
}

/// Locate the column-header row and resolve the columns the validator needs.
///
/// Returns the 0-based header row index and the column map.
pub fn detect_columns(table: &RawTable) -> Result<(usize, ColumnMap), LayoutError> {
    let scan = table.len().min(HEADER_SCAN_ROWS);

    for row in 0..scan {
        let headers: Vec<String> = table.rows()[row].iter().map(|c| norm_header(c)).collect();
        let Some(identifier) = headers.iter().position(|h| h == "ISIN") else {
            continue;
        };

        let find = |pred: fn(&str) -> bool| headers.iter().position(|h| pred(h));

        let occurrences = find(is_occurrences_header).ok_or(LayoutError::MissingColumn("OCCORRENZE"))?;
        let venue = find(is_venue_header).ok_or(LayoutError::MissingColumn("MERCATO"))?;
        let exec_date = find(is_exec_date_header).ok_or(LayoutError::MissingColumn("DATA ESEGUITO"))?;
        let exec_time = find(is_exec_time_header).ok_or(LayoutError::MissingColumn("ORA ESEGUITO"))?;
        let order_number = find(is_order_number_header);

        return Ok((
            row,
            ColumnMap {
                identifier,
                occurrences,
                venue,
                exec_date,
                exec_time,
                order_number,
            },
        ));
    }

    Err(LayoutError::HeaderNotFound { scanned: scan })
}

// ---------------------------------------------------------------------------
// Parsed model
// ---------------------------------------------------------------------------

/// One order row with its inherited instrument context.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    /// 0-based row index into the [`RawTable`] (output overlay position).
    pub row: usize,
    /// Index of the owning group in [`ParsedLayout::groups`].
    pub group: usize,
    pub order_number: Option<String>,
    /// Venue text as found, possibly with a parenthesised qualifier.
    pub venue_raw: String,
    pub exec_date: CellValue,
    pub exec_time: CellValue,
    pub outcome: OutcomeVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentGroup {
    /// Normalized (trimmed, upper-case) instrument identifier.
    pub identifier: String,
    pub declared_occurrences: u32,
    /// 0-based row index of the group header.
    pub header_row: usize,
    pub orders: Vec<OrderRecord>,
}

/// A group whose declared occurrence count differs from the orders parsed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Discrepancy {
    pub identifier: String,
    /// 1-based row number of the group header.
    pub header_row: usize,
    pub declared: u32,
    pub parsed: usize,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "identifier={} row={} declared={} parsed={}",
            self.identifier, self.header_row, self.declared, self.parsed
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLayout {
    /// 0-based row index of the column-header row.
    pub header_row: usize,
    pub columns: ColumnMap,
    pub groups: Vec<InstrumentGroup>,
    pub discrepancies: Vec<Discrepancy>,
}

impl ParsedLayout {
    pub fn order_count(&self) -> usize {
        self.groups.iter().map(|g| g.orders.len()).sum()
    }

    pub fn empty_group_count(&self) -> usize {
        self.groups.iter().filter(|g| g.orders.is_empty()).count()
    }

    /// All orders in source order.
    pub fn orders(&self) -> impl Iterator<Item = &OrderRecord> {
        self.groups.iter().flat_map(|g| g.orders.iter())
    }

    pub fn group_of(&self, order: &OrderRecord) -> &InstrumentGroup {
        &self.groups[order.group]
    }
}

// ---------------------------------------------------------------------------
// Row classification
// ---------------------------------------------------------------------------

/// Instrument identifier pattern: at least 12 ASCII alphanumerics after trimming.
pub fn is_identifier(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 12 && t.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Declared occurrence count. Anything that is not a non-negative integer
/// counts as 0. Spreadsheet exports may render integers as `"2.0"`.
pub fn parse_occurrences(s: &str) -> u32 {
    let t = s.trim();
    if let Ok(n) = t.parse::<u32>() {
        return n;
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => f as u32,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse `table` into instrument groups. See the module docs for the contract.
pub fn parse_layout(table: &RawTable) -> Result<ParsedLayout, LayoutError> {
    let (header_row, columns) = detect_columns(table)?;

    let mut groups: Vec<InstrumentGroup> = Vec::new();

    for row in (header_row + 1)..table.len() {
        if table.is_blank_row(row) {
            continue;
        }

        let id_cell = table.cell(row, columns.identifier);
        if is_identifier(id_cell) {
            groups.push(InstrumentGroup {
                identifier: id_cell.trim().to_ascii_uppercase(),
                declared_occurrences: parse_occurrences(table.cell(row, columns.occurrences)),
                header_row: row,
                orders: Vec::new(),
            });
            continue;
        }

        let group = match groups.len() {
            0 => return Err(LayoutError::OrphanOrderRow { row: row + 1 }),
            n => n - 1,
        };

        let order_number = columns
            .order_number
            .map(|c| table.cell(row, c).trim().to_string())
            .filter(|s| !s.is_empty());

        groups[group].orders.push(OrderRecord {
            row,
            group,
            order_number,
            venue_raw: table.cell(row, columns.venue).to_string(),
            exec_date: CellValue::from_raw(table.cell(row, columns.exec_date)),
            exec_time: CellValue::from_raw_time(table.cell(row, columns.exec_time)),
            outcome: OutcomeVector::default(),
        });
    }

    let discrepancies = groups
        .iter()
        .filter(|g| g.declared_occurrences as usize != g.orders.len())
        .map(|g| Discrepancy {
            identifier: g.identifier.clone(),
            header_row: g.header_row + 1,
            declared: g.declared_occurrences,
            parsed: g.orders.len(),
        })
        .collect();

    Ok(ParsedLayout {
        header_row,
        columns,
        groups,
        discrepancies,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    const HEADER: &[&str] = &[
        "ISIN",
        "OCCORRENZE",
        "NUMERO ORDINE",
        "MERCATO",
        "DATA ESEGUITO",
        "ORA ESEGUITO",
    ];

    // --- classification helpers ---

    #[test]
    fn identifier_pattern() {
        assert!(is_identifier("IT0001234567"));
        assert!(is_identifier("  it0001234567 "));
        assert!(!is_identifier("IT000123456"));
        assert!(!is_identifier("IT00012345-7"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn occurrences_parsing() {
        assert_eq!(parse_occurrences("2"), 2);
        assert_eq!(parse_occurrences(" 3 "), 3);
        assert_eq!(parse_occurrences("2.0"), 2);
        assert_eq!(parse_occurrences("two"), 0);
        assert_eq!(parse_occurrences("-1"), 0);
        assert_eq!(parse_occurrences("1.5"), 0);
        assert_eq!(parse_occurrences(""), 0);
    }

    // --- column detection ---

    #[test]
    fn header_found_below_preamble() {
        let t = table(&[&["Report CON-412"], &[""], HEADER]);
        let (row, cols) = detect_columns(&t).unwrap();
        assert_eq!(row, 2);
        assert_eq!(cols.identifier, 0);
        assert_eq!(cols.occurrences, 1);
        assert_eq!(cols.order_number, Some(2));
        assert_eq!(cols.venue, 3);
        assert_eq!(cols.exec_date, 4);
        assert_eq!(cols.exec_time, 5);
    }

    #[test]
    fn english_headers_are_recognised() {
        let t = table(&[&[
            "Execution Time",
            "isin",
            "Venue",
            "Occurrences",
            "Execution Date",
            "ORDER_NUM",
        ]]);
        let (_, cols) = detect_columns(&t).unwrap();
        assert_eq!(cols.identifier, 1);
        assert_eq!(cols.exec_time, 0);
        assert_eq!(cols.venue, 2);
        assert_eq!(cols.occurrences, 3);
        assert_eq!(cols.exec_date, 4);
        assert_eq!(cols.order_number, Some(5));
    }

    #[test]
    fn missing_header_row_is_structural() {
        let t = table(&[&["foo", "bar"]]);
        assert_eq!(
            detect_columns(&t).unwrap_err(),
            LayoutError::HeaderNotFound { scanned: 1 }
        );
    }

    #[test]
    fn header_beyond_scan_window_is_not_found() {
        let mut rows: Vec<Vec<String>> = vec![vec!["x".to_string()]; HEADER_SCAN_ROWS];
        rows.push(HEADER.iter().map(|c| c.to_string()).collect());
        let err = detect_columns(&RawTable::from_rows(rows)).unwrap_err();
        assert_eq!(err, LayoutError::HeaderNotFound { scanned: HEADER_SCAN_ROWS });
    }

    #[test]
    fn missing_required_column_is_named() {
        let t = table(&[&["ISIN", "OCCORRENZE", "MERCATO", "DATA ESEGUITO"]]);
        assert_eq!(
            detect_columns(&t).unwrap_err(),
            LayoutError::MissingColumn("ORA ESEGUITO")
        );
    }

    // --- grouping ---

    #[test]
    fn orders_inherit_the_latest_group() {
        let t = table(&[
            HEADER,
            &["IT0001234567", "2", "", "", "", ""],
            &["", "", "1001", "MTAA(MTA)", "15/09/2025", "10:00:00"],
            &["", "", "1002", "ZZZZ", "15/09/2025", "11:00:00"],
            &["DE0001234567", "1", "", "", "", ""],
            &["", "", "2001", "XETR", "16/09/2025", ""],
        ]);
        let layout = parse_layout(&t).unwrap();
        assert_eq!(layout.groups.len(), 2);
        assert_eq!(layout.groups[0].identifier, "IT0001234567");
        assert_eq!(layout.groups[0].orders.len(), 2);
        assert_eq!(layout.groups[1].orders.len(), 1);

        let second = &layout.groups[0].orders[1];
        assert_eq!(second.row, 3);
        assert_eq!(second.group, 0);
        assert_eq!(second.order_number.as_deref(), Some("1002"));
        assert_eq!(second.venue_raw, "ZZZZ");
        assert_eq!(layout.group_of(second).identifier, "IT0001234567");

        let last = &layout.groups[1].orders[0];
        assert_eq!(last.exec_time, CellValue::Empty);
        assert!(layout.discrepancies.is_empty());
        assert_eq!(layout.order_count(), 3);
    }

    #[test]
    fn empty_groups_are_retained() {
        let t = table(&[
            HEADER,
            &["IT0001234567", "0", "", "", "", ""],
            &["IT0009999999", "1", "", "", "", ""],
            &["", "", "1", "MTAA", "15/09/2025", "10:00:00"],
        ]);
        let layout = parse_layout(&t).unwrap();
        assert_eq!(layout.groups.len(), 2);
        assert!(layout.groups[0].orders.is_empty());
        assert_eq!(layout.empty_group_count(), 1);
        assert!(layout.discrepancies.is_empty());
    }

    #[test]
    fn count_mismatch_is_a_note_not_an_error() {
        let t = table(&[
            HEADER,
            &["IT0001234567", "3", "", "", "", ""],
            &["", "", "1", "MTAA", "15/09/2025", "10:00:00"],
        ]);
        let layout = parse_layout(&t).unwrap();
        assert_eq!(
            layout.discrepancies,
            vec![Discrepancy {
                identifier: "IT0001234567".to_string(),
                header_row: 2,
                declared: 3,
                parsed: 1,
            }]
        );
    }

    #[test]
    fn orphan_row_reports_its_position() {
        let t = table(&[
            &["title"],
            HEADER,
            &["", "", "", "", "", ""],
            &["", "", "1", "MTAA", "15/09/2025", "10:00:00"],
            &["IT0001234567", "1", "", "", "", ""],
        ]);
        assert_eq!(
            parse_layout(&t).unwrap_err(),
            LayoutError::OrphanOrderRow { row: 4 }
        );
        assert!(LayoutError::OrphanOrderRow { row: 4 }.to_string().contains("row 4"));
    }

    #[test]
    fn blank_rows_are_not_orders() {
        let t = table(&[
            HEADER,
            &["IT0001234567", "1", "", "", "", ""],
            &["", "", "", "", "", ""],
            &["", "", "1", "MTAA", "15/09/2025", "10:00:00"],
        ]);
        let layout = parse_layout(&t).unwrap();
        assert_eq!(layout.groups[0].orders.len(), 1);
        assert_eq!(layout.groups[0].orders[0].row, 3);
    }

    #[test]
    fn invalid_identifier_value_is_an_order_row() {
        let t = table(&[
            HEADER,
            &["IT0001234567", "1", "", "", "", ""],
            &["N/A", "", "1", "MTAA", "15/09/2025", "10:00:00"],
        ]);
        let layout = parse_layout(&t).unwrap();
        assert_eq!(layout.groups.len(), 1);
        assert_eq!(layout.groups[0].orders.len(), 1);
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let t = table(&[HEADER, &["IT0001234567", "1"], &["", "", "1", "MTAA"]]);
        let layout = parse_layout(&t).unwrap();
        let o = &layout.groups[0].orders[0];
        assert_eq!(o.exec_date, CellValue::Empty);
        assert_eq!(o.exec_time, CellValue::Empty);
    }
}
