//! Shared row pipeline for delimited-text and spreadsheet statements.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::columns::{map_columns, AmountColumns, ColumnMapping};
use crate::error::{IngestError, Result};
use crate::normalize::{parse_amount, parse_date, split_amount};
use crate::profiles::{self, BankFormatProfile};
use crate::types::{Cell, ParseResult, ParsedTransaction};

/// One physical row handed to [`extract_rows`]: its 1-based row number and either the
/// decoded cells or the reason it could not be decoded.
pub(crate) type SourceRow = (usize, std::result::Result<Vec<Cell>, String>);

pub(crate) fn select_profile(headers: &[String], hint: Option<&str>) -> &'static BankFormatProfile {
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => profiles::lookup(h),
        None => profiles::detect(headers),
    }
}

static EMPTY: Cell = Cell::Empty;

fn cell(cells: &[Cell], idx: usize) -> &Cell {
    cells.get(idx).unwrap_or(&EMPTY)
}

/// Build one transaction. `Ok(None)` means the row is dropped without comment
/// (empty description or zero amount); `Err` carries a warning message.
fn build_transaction(
    cells: &[Cell],
    headers: &[String],
    mapping: &ColumnMapping,
    profile: &BankFormatProfile,
) -> std::result::Result<Option<ParsedTransaction>, String> {
    let raw_date = cell(cells, mapping.date);
    let date = parse_date(raw_date, profile.date_formats)
        .ok_or_else(|| format!("Invalid date '{}'", raw_date.display()))?;

    let description = cell(cells, mapping.description).display();
    if description.is_empty() {
        return Ok(None);
    }

    let amount = match mapping.amount {
        AmountColumns::Single(idx) => parse_amount(cell(cells, idx)),
        AmountColumns::Split { credit, debit } => split_amount(cell(cells, credit), cell(cells, debit)),
    };
    if amount == 0.0 || !amount.is_finite() {
        return Ok(None);
    }

    let balance = mapping
        .balance
        .map(|idx| cell(cells, idx))
        .filter(|c| !c.is_blank())
        .map(parse_amount);

    let reference = mapping
        .reference
        .map(|idx| cell(cells, idx).display())
        .filter(|r| !r.is_empty());

    let raw_fields: BTreeMap<String, String> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.trim().is_empty())
        .map(|(i, h)| (h.trim().to_string(), cell(cells, i).display()))
        .collect();

    Ok(Some(ParsedTransaction {
        date,
        description,
        amount,
        balance,
        reference,
        raw_fields,
    }))
}

/// Detect the bank, map columns, and fold the data rows into a [`ParseResult`].
///
/// Column mapping failure aborts with [`IngestError::Structural`]; anything wrong with a
/// single row becomes a `"Row <n>: <reason>"` warning.
pub(crate) fn extract_rows<I>(headers: &[String], rows: I, hint: Option<&str>) -> Result<ParseResult>
where
    I: IntoIterator<Item = SourceRow>,
{
    let profile = select_profile(headers, hint);
    let mapping = map_columns(headers, profile).ok_or_else(|| {
        IngestError::Structural(format!(
            "Could not find required columns (date, description, and amount or debit/credit) in header: {}",
            headers.join(", ")
        ))
    })?;
    debug!(bank = profile.key, ?mapping, "resolved columns");

    let mut transactions = Vec::new();
    let mut warnings = Vec::new();

    for (row_no, row) in rows {
        let cells = match row {
            Ok(cells) => cells,
            Err(e) => {
                warn!(row = row_no, "{e}");
                warnings.push(format!("Row {row_no}: {e}"));
                continue;
            }
        };
        if cells.iter().all(Cell::is_blank) {
            continue;
        }
        match build_transaction(&cells, headers, &mapping, profile) {
            Ok(Some(txn)) => transactions.push(txn),
            Ok(None) => {}
            Err(e) => {
                warn!(row = row_no, "{e}");
                warnings.push(format!("Row {row_no}: {e}"));
            }
        }
    }

    Ok(ParseResult::from_transactions(transactions, warnings).with_bank_name(Some(profile.name.to_string())))
}
