//! Layout parsing from a spreadsheet-style CSV export on disk.
//!
//! GREEN when:
//! - the preamble and column-header row are skipped;
//! - groups keep source order, including a zero-order group;
//! - execution cells keep their native shape (text vs serial number);
//! - an orphan order row aborts with its 1-based row number.

use std::io::Write;

use trv_layout::{parse_layout, read_csv_file, CellValue, LayoutError};

const EXPORT: &str = "\
Rejected Transaction Reporting;;;;;;
;;;;;;
ISIN;OCCORRENZE;NUMERO ORDINE;MERCATO;DATA ESEGUITO;ORA ESEGUITO;NOTE
IT0001234567;2;;;;;
;;A-1;MTAA(MTA);15/09/2025;10:30:00;first
;;A-2;ZZZZ;45915;0,4375;second
IT0005555555;0;;;;;
DE000BAY0017;1;;;;;
;;B-1;XOFF(OTC);2025-09-16;;
";

fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn export_parses_into_groups() {
    let f = write_tmp(EXPORT);
    let table = read_csv_file(f.path(), b';').unwrap();
    assert_eq!(table.len(), 9);

    let layout = parse_layout(&table).unwrap();
    assert_eq!(layout.header_row, 2);

    let ids: Vec<&str> = layout.groups.iter().map(|g| g.identifier.as_str()).collect();
    assert_eq!(ids, vec!["IT0001234567", "IT0005555555", "DE000BAY0017"]);
    assert_eq!(layout.groups[0].declared_occurrences, 2);
    assert_eq!(layout.empty_group_count(), 1);
    assert_eq!(layout.order_count(), 3);
    assert!(layout.discrepancies.is_empty());

    let orders: Vec<_> = layout.orders().collect();
    assert_eq!(orders[0].venue_raw, "MTAA(MTA)");
    assert_eq!(orders[0].exec_date, CellValue::Text("15/09/2025".to_string()));
    assert_eq!(orders[1].exec_date, CellValue::Number(45915.0));
    assert_eq!(orders[1].exec_time, CellValue::Number(0.4375));
    assert_eq!(orders[2].exec_time, CellValue::Empty);
    assert_eq!(orders[2].group, 2);
}

#[test]
fn orphan_row_aborts_with_position() {
    let csv = "\
ISIN;OCCORRENZE;MERCATO;DATA ESEGUITO;ORA ESEGUITO
;;MTAA;15/09/2025;10:30:00
";
    let f = write_tmp(csv);
    let table = read_csv_file(f.path(), b';').unwrap();
    let err = parse_layout(&table).unwrap_err();
    assert_eq!(err, LayoutError::OrphanOrderRow { row: 2 });
}

#[test]
fn orphan_after_empty_line_reports_source_line() {
    let csv = "\
ISIN;OCCORRENZE;MERCATO;DATA ESEGUITO;ORA ESEGUITO

;;MTAA;15/09/2025;10:30:00
";
    let f = write_tmp(csv);
    let table = read_csv_file(f.path(), b';').unwrap();
    assert_eq!(table.len(), csv.lines().count());
    let err = parse_layout(&table).unwrap_err();
    assert_eq!(err, LayoutError::OrphanOrderRow { row: 3 });
}

#[test]
fn empty_lines_keep_row_positions() {
    let csv = "\
ISIN;OCCORRENZE;MERCATO;DATA ESEGUITO;ORA ESEGUITO
IT0001234567;1;;;

;;MTAA;15/09/2025;10:30:00
";
    let f = write_tmp(csv);
    let table = read_csv_file(f.path(), b';').unwrap();
    assert_eq!(table.len(), 4);

    let layout = parse_layout(&table).unwrap();
    assert_eq!(layout.order_count(), 1);
    assert_eq!(layout.groups[0].orders[0].row, 3);
}

#[test]
fn windows_1252_export_is_read() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(b"Societ\xE0 Rejected;;;;\nISIN;OCCORRENZE;MERCATO;DATA ESEGUITO;ORA ESEGUITO\nIT0001234567;1;;;\n;;MTAA;15/09/2025;10.30\n")
        .unwrap();
    let table = read_csv_file(f.path(), b';').unwrap();
    assert_eq!(table.encoding(), encoding_rs::WINDOWS_1252);
    assert_eq!(table.cell(0, 0), "Società Rejected");

    let layout = parse_layout(&table).unwrap();
    assert_eq!(layout.order_count(), 1);
    assert_eq!(
        layout.groups[0].orders[0].exec_time,
        CellValue::Text("10.30".to_string())
    );
}
