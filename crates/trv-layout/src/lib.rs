//! trv-layout
//!
//! Reads the grouped transaction-reporting table and turns it into
//! instrument groups with their order records.
//!
//! The input alternates group-header rows (instrument identifier + declared
//! occurrence count) and order rows. Every cell is kept verbatim in
//! [`table::RawTable`] so the result writer can reproduce the original
//! columns exactly; the parser only adds structure on top of it.
//!
//! This crate does **not**:
//! - talk to the reference source (see `trv-reference`)
//! - evaluate checks (see `trv-validate`)
//! - write output (see `trv-artifacts`)

pub mod cell;
pub mod outcome;
pub mod parser;
pub mod table;

pub use cell::CellValue;
pub use outcome::{Check, CheckState, OutcomeVector};
pub use parser::{
    is_identifier, parse_layout, parse_occurrences, ColumnMap, Discrepancy, InstrumentGroup,
    LayoutError, OrderRecord, ParsedLayout, HEADER_SCAN_ROWS,
};
pub use table::{read_csv_bytes, read_csv_file, read_csv_str, RawTable};
