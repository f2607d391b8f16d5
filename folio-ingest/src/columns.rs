use crate::profiles::BankFormatProfile;

/// Reference columns are rarely standardized, so they are not part of a profile.
const REFERENCE_PATTERNS: &[&str] = &[
    "reference",
    "ref no",
    "ref.",
    "transaction id",
    "cheque",
    "chq",
    "check or slip",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountColumns {
    /// One signed amount column.
    Single(usize),
    /// Unsigned money-in and money-out columns.
    Split { credit: usize, debit: usize },
}

/// Resolved column positions (zero-based) for one header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub date: usize,
    pub description: usize,
    pub amount: AmountColumns,
    pub balance: Option<usize>,
    pub reference: Option<usize>,
}

/// Index of the first header containing the first pattern that matches anything.
fn find_column(headers: &[String], patterns: &[&str]) -> Option<usize> {
    patterns
        .iter()
        .find_map(|pat| headers.iter().position(|h| h.contains(pat)))
}

/// Map logical columns onto `headers` using the profile's patterns.
///
/// Returns `None` unless date and description resolve, and either an amount
/// column or both credit and debit columns resolve.
pub fn map_columns(headers: &[String], profile: &BankFormatProfile) -> Option<ColumnMapping> {
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let p = &profile.header_patterns;

    let date = find_column(&lowered, p.date)?;
    let description = find_column(&lowered, p.description)?;

    let amount = match find_column(&lowered, p.amount) {
        Some(idx) => AmountColumns::Single(idx),
        None => AmountColumns::Split {
            credit: find_column(&lowered, p.credit)?,
            debit: find_column(&lowered, p.debit)?,
        },
    };

    Some(ColumnMapping {
        date,
        description,
        amount,
        balance: find_column(&lowered, p.balance),
        reference: find_column(&lowered, REFERENCE_PATTERNS),
    })
}
