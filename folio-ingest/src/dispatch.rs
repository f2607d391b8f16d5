//! Entry point: classify an upload, enforce limits, route to an extractor.

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::delimited::parse_delimited;
use crate::document::{DocumentExtractor, DocumentOptions, ExtractionCollaborator, NoCollaborator};
use crate::error::{IngestError, Result};
use crate::spreadsheet::parse_spreadsheet;
use crate::types::{ParseResult, RawInput};

/// Uploads above this many bytes are refused before parsing (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
    Pdf,
}

impl FileKind {
    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileKind::Xlsx | FileKind::Xls)
    }

    /// Canonical media type, used when the caller did not declare one.
    pub fn media_type(&self) -> &'static str {
        match self {
            FileKind::Csv => "text/csv",
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileKind::Xls => "application/vnd.ms-excel",
            FileKind::Pdf => "application/pdf",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(FileKind::Csv),
            "xlsx" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/csv" | "application/csv" | "text/tab-separated-values" => Some(FileKind::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(FileKind::Xlsx),
            "application/vnd.ms-excel" => Some(FileKind::Xls),
            "application/pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }
}

/// Kind of statement, by file extension first and declared media type second.
pub fn classify(input: &RawInput) -> Option<FileKind> {
    Path::new(&input.name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileKind::from_extension)
        .or_else(|| FileKind::from_media_type(&input.media_type))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn check(input: &RawInput) -> Result<FileKind> {
    if input.size > MAX_FILE_SIZE {
        return Err(IngestError::Rejected(format!(
            "File size ({:.1} MB) exceeds the 10 MB limit",
            input.size as f64 / (1024.0 * 1024.0)
        )));
    }
    classify(input).ok_or_else(|| {
        IngestError::Rejected(format!(
            "Unsupported file type for '{}'. Please upload a CSV, Excel (XLSX/XLS) or PDF statement",
            input.name
        ))
    })
}

pub fn validate(input: &RawInput) -> Validation {
    match check(input) {
        Ok(_) => Validation { valid: true, error: None },
        Err(e) => Validation {
            valid: false,
            error: Some(e.to_string()),
        },
    }
}

/// Routes uploads to the right extractor and folds every failure into a [`ParseResult`].
pub struct StatementParser<C = NoCollaborator> {
    documents: DocumentExtractor<C>,
}

impl StatementParser<NoCollaborator> {
    /// Parser without an extraction service; PDF uploads fail with an explanatory error.
    pub fn new() -> Self {
        Self {
            documents: DocumentExtractor::new(NoCollaborator, DocumentOptions::default()),
        }
    }
}

impl Default for StatementParser<NoCollaborator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ExtractionCollaborator> StatementParser<C> {
    pub fn with_collaborator(collaborator: C, options: DocumentOptions) -> Self {
        Self {
            documents: DocumentExtractor::new(collaborator, options),
        }
    }

    /// Parse one uploaded statement. Errors never escape; inspect `success`,
    /// `warnings` and `error` on the result.
    pub async fn parse_statement(&self, input: &RawInput, hint: Option<&str>) -> ParseResult {
        let kind = match check(input) {
            Ok(kind) => kind,
            Err(e) => {
                error!(file = %input.name, "statement rejected: {e}");
                return ParseResult::failure(e.to_string());
            }
        };
        info!(file = %input.name, ?kind, size = input.size, "parsing statement");

        let result = if kind.is_spreadsheet() {
            parse_spreadsheet(input.bytes(), hint)
        } else if kind == FileKind::Csv {
            parse_delimited(&input.text(), hint)
        } else {
            self.documents.parse_document(input, hint).await
        };

        match &result.error {
            Some(e) => error!(file = %input.name, "statement rejected: {e}"),
            None => info!(
                file = %input.name,
                transactions = result.transactions.len(),
                warnings = result.warnings.len(),
                "statement parsed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, media_type: &str) -> RawInput {
        RawInput::from_bytes(name, media_type, Vec::new())
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify(&named("jan.CSV", "")), Some(FileKind::Csv));
        assert_eq!(classify(&named("jan.xlsx", "")), Some(FileKind::Xlsx));
        assert_eq!(classify(&named("jan.xls", "")), Some(FileKind::Xls));
        assert_eq!(classify(&named("jan.pdf", "")), Some(FileKind::Pdf));
    }

    #[test]
    fn test_classify_by_media_type() {
        assert_eq!(classify(&named("upload", "text/csv; charset=utf-8")), Some(FileKind::Csv));
        assert_eq!(classify(&named("blob", "application/pdf")), Some(FileKind::Pdf));
        assert_eq!(classify(&named("blob", "application/vnd.ms-excel")), Some(FileKind::Xls));
        assert!(FileKind::Xls.is_spreadsheet());
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(classify(&named("photo.png", "image/png")), None);
        let v = validate(&named("photo.png", "image/png"));
        assert!(!v.valid);
        assert!(v.error.unwrap().contains("Unsupported file type"));
    }

    #[test]
    fn test_size_limit() {
        let mut input = named("big.csv", "text/csv");
        input.size = MAX_FILE_SIZE;
        assert!(validate(&input).valid);
        input.size = MAX_FILE_SIZE + 1;
        let v = validate(&input);
        assert!(!v.valid);
        assert!(v.error.unwrap().contains("10 MB"));
    }
}
