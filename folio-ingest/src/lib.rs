//! folio-ingest: bank statement ingestion (CSV, spreadsheets, PDF) into signed transactions.

pub mod columns;
pub mod delimited;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod profiles;
pub mod spreadsheet;
mod tabular;
pub mod types;

pub use columns::{map_columns, AmountColumns, ColumnMapping};
pub use delimited::{detect_delimiter, parse_delimited};
pub use dispatch::{classify, validate, FileKind, StatementParser, Validation, MAX_FILE_SIZE};
pub use document::{
    CollaboratorReply, DocumentExtractor, DocumentOptions, ExtractionCollaborator, ExtractionRequest,
    NoCollaborator,
};
pub use error::IngestError;
pub use llm::{HttpCollaborator, LlmConfig, Provider};
pub use normalize::{parse_amount, parse_date, DateFormat};
pub use profiles::{BankFormatProfile, GENERIC, PROFILES};
pub use spreadsheet::parse_spreadsheet;
pub use types::{Cell, Content, ParseResult, ParsedTransaction, RawInput};
