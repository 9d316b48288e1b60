//! Raw tabular input.
//!
//! A [`RawTable`] is the spreadsheet as rows of verbatim cell text. Nothing is
//! trimmed or typed here; the parser reads through it and the result writer
//! copies it back out untouched, in the encoding it was read with.
//!
//! Every record becomes one row and every empty line becomes an empty row, so
//! row positions and the output row count line up with the input file.

use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::parser::LayoutError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Rows of raw cell text in source order. Rows may be ragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
    encoding: &'static Encoding,
}

impl Default for RawTable {
    fn default() -> Self {
        Self::from_rows(Vec::new())
    }
}

impl RawTable {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            encoding: UTF_8,
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Source text encoding: UTF-8, or Windows-1252 when the bytes were not
    /// valid UTF-8.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row, in cells.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text at `(row, col)`; a cell past the end of a short row reads as "".
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// True when every cell of `row` is blank after trimming.
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map(|r| r.iter().all(|c| c.trim().is_empty()))
            .unwrap_or(true)
    }
}

/// Read a delimited file at `path` into a [`RawTable`].
///
/// A leading UTF-8 BOM is dropped (spreadsheet exports on Windows add one).
pub fn read_csv_file(path: &Path, delimiter: u8) -> Result<RawTable, LayoutError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| LayoutError::Io(format!("open '{}': {e}", path.display())))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| LayoutError::Io(format!("read '{}': {e}", path.display())))?;

    read_csv_bytes(&buf, delimiter)
}

/// Read delimited text from a string slice (tests, in-memory sources).
pub fn read_csv_str(src: &str, delimiter: u8) -> Result<RawTable, LayoutError> {
    read_csv_bytes(src.as_bytes(), delimiter)
}

/// Read delimited bytes, decoding as UTF-8 or falling back to Windows-1252.
pub fn read_csv_bytes(bytes: &[u8], delimiter: u8) -> Result<RawTable, LayoutError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let (text, encoding) = decode(bytes);
    let src = text.as_bytes();

    // Byte offsets of every '\n'; the line of offset `pos` is the number of
    // newlines before it.
    let newlines: Vec<usize> = src
        .iter()
        .enumerate()
        .filter_map(|(i, b)| (*b == b'\n').then_some(i))
        .collect();
    let line_of = |pos: usize| newlines.partition_point(|&n| n < pos);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(src);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut consumed = 0usize;
    // First source line not yet covered by a row.
    let mut next_line = 0usize;

    loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|e| LayoutError::Io(format!("row {}: {e}", rows.len() + 1)))?;
        if !more {
            break;
        }
        let end = usize::try_from(reader.position().byte())
            .map_err(|e| LayoutError::Io(format!("row {}: {e}", rows.len() + 1)))?
            .min(src.len());

        // The reader skips empty lines silently; put them back as empty rows.
        let start = consumed + leading_terminators(&src[consumed..end]);
        push_blank_rows(&mut rows, line_of(start).saturating_sub(next_line));
        rows.push(record.iter().map(str::to_string).collect());

        // A quoted field may carry newlines; the record still ends up as one row.
        let content_end = (end - trailing_terminators(&src[start..end])).max(start + 1);
        next_line = line_of(content_end - 1) + 1;
        consumed = end;
    }

    push_blank_rows(&mut rows, line_count(src).saturating_sub(next_line));

    Ok(RawTable { rows, encoding })
}

fn decode(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), UTF_8),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, WINDOWS_1252)
        }
    }
}

fn is_terminator(b: &u8) -> bool {
    *b == b'\r' || *b == b'\n'
}

fn leading_terminators(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| is_terminator(b)).count()
}

fn trailing_terminators(bytes: &[u8]) -> usize {
    bytes.iter().rev().take_while(|b| is_terminator(b)).count()
}

/// Number of physical lines; a final terminator does not open a new line.
fn line_count(src: &[u8]) -> usize {
    if src.is_empty() {
        return 0;
    }
    let breaks = src.iter().filter(|b| **b == b'\n').count();
    if src.ends_with(b"\n") {
        breaks
    } else {
        breaks + 1
    }
}

fn push_blank_rows(rows: &mut Vec<Vec<String>>, count: usize) {
    rows.extend(std::iter::repeat_with(Vec::new).take(count));
}
