//! Delimited-text statements (CSV and friends).

use csv::{ReaderBuilder, Trim};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::tabular::{extract_rows, SourceRow};
use crate::types::{Cell, ParseResult};

const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Most frequent separator in the header line. Ties go to the comma.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0;
    for &c in &CANDIDATES {
        let count = header_line.bytes().filter(|b| *b == c).count();
        if count > best_count {
            best = c;
            best_count = count;
        }
    }
    best
}

/// 1-based physical line of the record starting at `byte`. Blank lines the reader
/// skipped in front of the record are counted too.
fn physical_line(text: &str, byte: u64) -> usize {
    let start = (byte as usize).min(text.len());
    let start = text
        .get(start..)
        .and_then(|rest| rest.find(|c: char| c != '\r' && c != '\n'))
        .map_or(text.len(), |i| start + i);
    text.as_bytes()[..start].iter().filter(|b| **b == b'\n').count() + 1
}

fn extract_delimited(text: &str, hint: Option<&str>) -> Result<ParseResult> {
    let header_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| IngestError::Structural("No header row found in file".to_string()))?;
    let delimiter = detect_delimiter(header_line);
    debug!(delimiter = %(delimiter as char).escape_default(), "detected delimiter");

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows: Vec<SourceRow> = Vec::new();
    let mut last_line = 0usize;

    for result in rdr.records() {
        match result {
            Ok(record) => {
                let line = record.position().map_or(last_line + 1, |p| physical_line(text, p.byte()));
                last_line = line;
                if headers.is_none() {
                    if record.iter().all(|f| f.is_empty()) {
                        continue;
                    }
                    headers = Some(record.iter().map(str::to_string).collect());
                    continue;
                }
                rows.push((line, Ok(record.iter().map(Cell::from).collect())));
            }
            Err(e) => {
                let line = e.position().map_or(last_line + 1, |p| physical_line(text, p.byte()));
                last_line = line;
                rows.push((line, Err(format!("could not read row: {e}"))));
            }
        }
    }

    let headers = headers.ok_or_else(|| IngestError::Structural("No header row found in file".to_string()))?;
    extract_rows(&headers, rows, hint)
}

/// Parse delimited statement text. The first non-blank line is the header.
pub fn parse_delimited(text: &str, hint: Option<&str>) -> ParseResult {
    extract_delimited(text, hint).unwrap_or_else(|e| ParseResult::failure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("Date,Description,Amount"), b',');
        assert_eq!(detect_delimiter("Date;Description;Amount"), b';');
        assert_eq!(detect_delimiter("Date\tDescription\tAmount"), b'\t');
        assert_eq!(detect_delimiter("Date|Description|Amount"), b'|');
        assert_eq!(detect_delimiter("Date;Description,Amount"), b',');
        assert_eq!(detect_delimiter("Header"), b',');
    }

    #[test]
    fn test_debit_credit_statement() {
        let csv = "Date,Description,Debit,Credit\n\
                   01/11/2025,Coffee Shop,15.00,\n\
                   02/11/2025,Salary,,50000.00\n\
                   03/11/2025,Refund,,0.00\n";
        let r = parse_delimited(csv, None);
        assert!(r.success);
        assert_eq!(r.transactions.len(), 2);
        assert_eq!(r.transactions[0].amount, -15.0);
        assert_eq!(r.transactions[1].amount, 50000.0);
        assert_eq!(r.period_start, NaiveDate::from_ymd_opt(2025, 11, 1));
        assert_eq!(r.period_end, NaiveDate::from_ymd_opt(2025, 11, 2));
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        let csv = "Date,Description,Amount\n\
                   2024-03-01,\"ACME, Inc \"\"store\"\"\",\"-1,250.00\"\n";
        let r = parse_delimited(csv, None);
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.transactions[0].description, "ACME, Inc \"store\"");
        assert_eq!(r.transactions[0].amount, -1250.0);
    }

    #[test]
    fn test_semicolon_and_trimming() {
        let csv = "Date ; Narration ; Amount\n 15-Jan-2024 ;  Airtime ; 500.00 DR \n";
        let r = parse_delimited(csv, None);
        assert_eq!(r.transactions.len(), 1);
        let t = &r.transactions[0];
        assert_eq!(t.description, "Airtime");
        assert_eq!(t.amount, -500.0);
        assert_eq!(t.raw_fields["Narration"], "Airtime");
    }

    #[test]
    fn test_row_numbers_in_warnings() {
        let csv = "Date,Description,Amount\n\n2024-13-45,Bad,10\n2024-01-02,Good,10\n";
        let r = parse_delimited(csv, None);
        assert!(r.success);
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.warnings, vec!["Row 3: Invalid date '2024-13-45'".to_string()]);
    }

    #[test]
    fn test_row_numbers_count_every_physical_line() {
        let csv = "\nDate,Description,Amount\r\n2024-01-01,Ok,5\r\n\r\n\r\n31/02/2024,Bad,5\r\n";
        let r = parse_delimited(csv, None);
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.warnings, vec!["Row 6: Invalid date '31/02/2024'".to_string()]);
    }

    #[test]
    fn test_physical_line() {
        let text = "a\n\nb\n";
        assert_eq!(physical_line(text, 0), 1);
        assert_eq!(physical_line(text, 2), 3);
        assert_eq!(physical_line(text, 3), 3);
        assert_eq!(physical_line(text, 4), 4);
        assert_eq!(physical_line(text, 99), 4);
    }

    #[test]
    fn test_empty_input_fails() {
        let r = parse_delimited("  \n\n", None);
        assert!(!r.success);
        assert!(r.transactions.is_empty());
        assert_eq!(r.error.as_deref(), Some("No header row found in file"));
    }

    #[test]
    fn test_unknown_columns_fail() {
        let r = parse_delimited("Foo,Bar\n1,2\n", None);
        assert!(!r.success);
        assert!(r.error.unwrap().contains("required columns"));
    }

    #[test]
    fn test_single_amount_header_matched_to_bank_still_parses() {
        let r = parse_delimited("Transaction Date,Description,Amount\n2024-01-02,Coffee,-4.50\n", None);
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.bank_name.as_deref(), Some("Access Bank"));
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.transactions[0].amount, -4.5);
    }

    #[test]
    fn test_split_amount_header_matched_to_chase_still_parses() {
        let csv = "Posting Date,Description,Debit,Credit\n\
                   01/15/2024,Card purchase,25.00,\n\
                   01/16/2024,Payroll,,1200.00\n";
        let r = parse_delimited(csv, None);
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.bank_name.as_deref(), Some("Chase"));
        let amounts: Vec<f64> = r.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![-25.0, 1200.0]);
        assert_eq!(r.period_start, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(r.period_end, NaiveDate::from_ymd_opt(2024, 1, 16));
    }

    #[test]
    fn test_trailing_minus_row_is_kept() {
        let r = parse_delimited("Date,Description,Amount\n2024-01-03,Standing order,500.00-\n", None);
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.transactions[0].amount, -500.0);
    }

    #[test]
    fn test_detects_bank_from_header() {
        let csv = "Trans. Date,Value. Date,Reference,Debits,Credits,Balance,Remarks\n\
                   15-Jan-2024,15-Jan-2024,TRF123,\"5,000.00\",,\"95,000.00\",TRANSFER TO JOHN\n";
        let r = parse_delimited(csv, None);
        assert_eq!(r.bank_name.as_deref(), Some("GTBank"));
        let t = &r.transactions[0];
        assert_eq!(t.amount, -5000.0);
        assert_eq!(t.balance, Some(95000.0));
        assert_eq!(t.reference.as_deref(), Some("TRF123"));
    }
}
