use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Uploaded statement as handed to the dispatcher. Lives for one parse call.
#[derive(Debug, Clone)]
pub struct RawInput {
    pub name: String,
    pub media_type: String,
    /// Size in bytes, checked against the upload ceiling before anything is read.
    pub size: u64,
    pub content: Content,
}

#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl RawInput {
    pub fn from_bytes(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            content: Content::Bytes(bytes),
        }
    }

    pub fn from_text(name: impl Into<String>, media_type: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: text.len() as u64,
            content: Content::Text(text),
        }
    }

    /// Decoded text view. Invalid UTF-8 is replaced and a leading BOM is dropped.
    pub fn text(&self) -> String {
        let s = match &self.content {
            Content::Text(t) => t.clone(),
            Content::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        };
        match s.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => s,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.content {
            Content::Text(t) => t.as_bytes(),
            Content::Bytes(b) => b,
        }
    }
}

/// A single tabular value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    /// Spreadsheet cell already typed as a date.
    Date(NaiveDate),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// Normalized transaction, bank-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Positive means funds received (credit); negative means funds paid out (debit). Never zero.
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Source cells keyed by header text.
    pub raw_fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub success: bool,
    pub transactions: Vec<ParsedTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParseResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transactions: Vec::new(),
            bank_name: None,
            account_number: None,
            period_start: None,
            period_end: None,
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Successful result. The period is derived from a sorted copy of the dates so
    /// `transactions` keeps source order.
    pub fn from_transactions(transactions: Vec<ParsedTransaction>, warnings: Vec<String>) -> Self {
        let mut dates: Vec<NaiveDate> = transactions.iter().map(|t| t.date).collect();
        dates.sort();

        Self {
            success: true,
            period_start: dates.first().copied(),
            period_end: dates.last().copied(),
            transactions,
            bank_name: None,
            account_number: None,
            warnings,
            error: None,
        }
    }

    pub fn with_bank_name(mut self, name: Option<String>) -> Self {
        self.bank_name = name;
        self
    }

    pub fn with_account_number(mut self, number: Option<String>) -> Self {
        self.account_number = number;
        self
    }
}
