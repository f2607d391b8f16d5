//! Spreadsheet statements (XLSX and legacy XLS share this path).

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::normalize::serial_to_date;
use crate::tabular::{extract_rows, SourceRow};
use crate::types::{Cell, ParseResult};

/// How far down the sheet the header row may sit.
const HEADER_SCAN_ROWS: usize = 10;

const DATE_TOKENS: &[&str] = &["date", "posted", "value date"];
const DESCRIPTION_TOKENS: &[&str] = &[
    "description",
    "narration",
    "details",
    "remarks",
    "particulars",
];
const ACCOUNT_LABELS: &[&str] = &["account number", "account no", "acct no", "a/c no"];

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.as_str()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match serial_to_date(dt.as_f64()) {
            Some(d) => Cell::Date(d),
            None => Cell::Number(dt.as_f64()),
        },
    }
}

/// First worksheet as a grid of cells, with the sheet row number of its first row.
fn read_first_sheet(bytes: &[u8]) -> Result<(usize, Vec<Vec<Cell>>)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Structural("Workbook has no worksheets".to_string()))?
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let grid = range.rows().map(|r| r.iter().map(to_cell).collect()).collect();
    Ok((first_row, grid))
}

fn row_text(row: &[Cell]) -> Vec<String> {
    row.iter().map(|c| c.display().to_lowercase()).collect()
}

fn looks_like_header(row: &[Cell]) -> bool {
    let cells = row_text(row);
    let has = |tokens: &[&str]| cells.iter().any(|c| tokens.iter().any(|t| c.contains(t)));
    has(DATE_TOKENS) && has(DESCRIPTION_TOKENS)
}

/// Index of the header row: the first of the leading rows that names both a date and a
/// description column, else the first row with any content.
pub(crate) fn find_header_row(grid: &[Vec<Cell>]) -> Option<usize> {
    grid.iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| looks_like_header(row))
        .or_else(|| grid.iter().position(|row| row.iter().any(|c| !c.is_blank())))
}

/// Account number from the preamble above the header, e.g. `Account Number: 0123456789`
/// or a label cell followed by a value cell.
pub(crate) fn find_account_number(preamble: &[Vec<Cell>]) -> Option<String> {
    for row in preamble {
        for (i, cell) in row.iter().enumerate() {
            let text = cell.display();
            let lower = text.to_lowercase();
            if !ACCOUNT_LABELS.iter().any(|l| lower.contains(l)) {
                continue;
            }
            let candidate = match text.split_once(':') {
                Some((_, rest)) if !rest.trim().is_empty() => rest.trim().to_string(),
                _ => match row[i + 1..].iter().find(|c| !c.is_blank()) {
                    Some(next) => next.display(),
                    None => continue,
                },
            };
            let digits: String = candidate.chars().filter(char::is_ascii_digit).collect();
            if digits.len() >= 6 {
                return Some(digits);
            }
        }
    }
    None
}

pub(crate) fn extract_grid(first_row: usize, grid: Vec<Vec<Cell>>, hint: Option<&str>) -> Result<ParseResult> {
    let header_idx = find_header_row(&grid)
        .ok_or_else(|| IngestError::Structural("No header row found in spreadsheet".to_string()))?;
    debug!(row = first_row + header_idx + 1, "found header row");

    let headers: Vec<String> = grid[header_idx].iter().map(Cell::display).collect();
    let account_number = find_account_number(&grid[..header_idx]);

    let rows: Vec<SourceRow> = grid
        .into_iter()
        .enumerate()
        .skip(header_idx + 1)
        .map(|(i, cells)| (first_row + i + 1, Ok(cells)))
        .collect();

    Ok(extract_rows(&headers, rows, hint)?.with_account_number(account_number))
}

fn extract_spreadsheet(bytes: &[u8], hint: Option<&str>) -> Result<ParseResult> {
    let (first_row, grid) = read_first_sheet(bytes)?;
    extract_grid(first_row, grid, hint)
}

/// Parse an XLSX/XLS workbook. Only the first worksheet is read.
pub fn parse_spreadsheet(bytes: &[u8], hint: Option<&str>) -> ParseResult {
    extract_spreadsheet(bytes, hint).unwrap_or_else(|e| ParseResult::failure(e.to_string()))
}
