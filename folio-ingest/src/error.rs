use thiserror::Error;

/// Whole-parse failures. Row-level problems never become an `IngestError`;
/// they are collected as warnings instead.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Oversized or unrecognized upload, refused before parsing.
    #[error("{0}")]
    Rejected(String),

    /// Header row or required columns could not be located.
    #[error("{0}")]
    Structural(String),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    /// Transport error, non-success reply, or malformed reply from the extraction service.
    #[error("Document extraction failed: {0}")]
    Collaborator(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
