//! Unstructured statements (PDF) via an external extraction service.
//!
//! The service is untrusted: its reply is decoded into a loose shape first and every
//! transaction is revalidated before it becomes a [`ParsedTransaction`].

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::normalize::{parse_amount_str, parse_iso_date};
use crate::profiles;
use crate::types::{ParseResult, ParsedTransaction, RawInput};

pub const EXTRACTION_PROMPT: &str = r#"You are a bank statement parser. Extract every transaction from the attached statement.

Respond with a single JSON object and nothing else, using exactly this schema:
{
  "bankName": string or null,
  "accountNumber": string or null,
  "periodStart": "YYYY-MM-DD" or null,
  "periodEnd": "YYYY-MM-DD" or null,
  "transactions": [
    {
      "date": "YYYY-MM-DD",
      "description": string,
      "amount": number,
      "balance": number or null,
      "reference": string or null,
      "type": "credit" or "debit"
    }
  ]
}

Rules:
- Dates must be ISO 8601 (YYYY-MM-DD).
- amount is positive for money received (credit) and negative for money paid out (debit).
- Omit opening/closing balance lines and totals; include only real transactions.
- Do not invent transactions that are not in the document."#;

/// What the extraction service is asked to process.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub file_name: &'a str,
    pub media_type: &'a str,
    pub bytes: &'a [u8],
    pub prompt: &'a str,
}

/// The service either returns a structured object or free text containing one.
#[derive(Debug, Clone)]
pub enum CollaboratorReply {
    Structured(Value),
    Text(String),
}

/// External service that turns a document into statement JSON.
pub trait ExtractionCollaborator: Send + Sync {
    fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> impl Future<Output = anyhow::Result<CollaboratorReply>> + Send;
}

/// Stand-in used when no extraction service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollaborator;

impl ExtractionCollaborator for NoCollaborator {
    async fn extract(&self, _request: ExtractionRequest<'_>) -> anyhow::Result<CollaboratorReply> {
        anyhow::bail!("no document extraction service is configured")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentOptions {
    /// Upper bound for a single call to the service.
    pub timeout: Duration,
    /// Extra attempts after a transport failure or timeout.
    pub retries: u32,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retries: 1,
        }
    }
}

/// First balanced `{...}` span in `text`, ignoring braces inside string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    fn value(&self) -> f64 {
        match self {
            LooseNumber::Number(n) => *n,
            LooseNumber::Text(s) => parse_amount_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatement {
    transactions: Option<Vec<Value>>,
    #[serde(alias = "bank_name")]
    bank_name: Option<String>,
    #[serde(alias = "account_number")]
    account_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    date: Option<String>,
    description: Option<String>,
    amount: Option<LooseNumber>,
    balance: Option<LooseNumber>,
    reference: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Unwrap the reply into the statement object, or fail the whole parse.
fn reply_to_object(reply: CollaboratorReply) -> Result<Value> {
    let value = match reply {
        CollaboratorReply::Structured(v) => v,
        CollaboratorReply::Text(text) => {
            let span = extract_json_object(&text)
                .ok_or_else(|| IngestError::Collaborator("response contained no JSON object".to_string()))?;
            serde_json::from_str(span)
                .map_err(|e| IngestError::Collaborator(format!("response JSON is malformed: {e}")))?
        }
    };

    // Some deployments wrap the payload as { success, data, error }.
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let msg = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("service reported failure");
        return Err(IngestError::Collaborator(msg.to_string()));
    }
    match value.get("data") {
        Some(data) if data.is_object() => Ok(data.clone()),
        _ => Ok(value),
    }
}

fn to_transaction(raw: RawTransaction) -> std::result::Result<Option<ParsedTransaction>, String> {
    let date_text = raw.date.unwrap_or_default();
    let date = parse_iso_date(&date_text).ok_or_else(|| format!("Invalid date '{date_text}'"))?;

    let description = raw.description.unwrap_or_default().trim().to_string();
    if description.is_empty() {
        return Ok(None);
    }

    let mut amount = raw.amount.as_ref().map_or(0.0, LooseNumber::value);
    match raw.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("debit") => amount = -amount.abs(),
        Some("credit") => amount = amount.abs(),
        _ => {}
    }
    if amount == 0.0 || !amount.is_finite() {
        return Ok(None);
    }

    let mut raw_fields = BTreeMap::new();
    raw_fields.insert("date".to_string(), date_text);
    raw_fields.insert("description".to_string(), description.clone());
    raw_fields.insert("amount".to_string(), amount.to_string());
    if let Some(kind) = &raw.kind {
        raw_fields.insert("type".to_string(), kind.clone());
    }

    Ok(Some(ParsedTransaction {
        date,
        description,
        amount,
        balance: raw.balance.as_ref().map(LooseNumber::value),
        reference: raw.reference.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
        raw_fields,
    }))
}

/// Validate a decoded reply into a [`ParseResult`].
pub(crate) fn reply_to_result(reply: CollaboratorReply, hint: Option<&str>) -> Result<ParseResult> {
    let object = reply_to_object(reply)?;
    let statement: RawStatement = serde_json::from_value(object)
        .map_err(|e| IngestError::Collaborator(format!("response does not match the statement schema: {e}")))?;
    let entries = statement
        .transactions
        .ok_or_else(|| IngestError::Collaborator("response has no transactions array".to_string()))?;

    let mut transactions = Vec::new();
    let mut warnings = Vec::new();
    for (i, entry) in entries.into_iter().enumerate() {
        let row_no = i + 1;
        let outcome = serde_json::from_value::<RawTransaction>(entry)
            .map_err(|e| format!("malformed transaction: {e}"))
            .and_then(to_transaction);
        match outcome {
            Ok(Some(txn)) => transactions.push(txn),
            Ok(None) => {}
            Err(e) => {
                warn!(row = row_no, "{e}");
                warnings.push(format!("Row {row_no}: {e}"));
            }
        }
    }

    let bank_name = statement
        .bank_name
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .or_else(|| hint.map(|h| profiles::lookup(h)).filter(|p| !p.is_generic()).map(|p| p.name.to_string()));
    let account_number = statement
        .account_number
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    Ok(ParseResult::from_transactions(transactions, warnings)
        .with_bank_name(bank_name)
        .with_account_number(account_number))
}

/// Document path of the dispatcher.
pub struct DocumentExtractor<C> {
    collaborator: C,
    options: DocumentOptions,
}

impl<C: ExtractionCollaborator> DocumentExtractor<C> {
    pub fn new(collaborator: C, options: DocumentOptions) -> Self {
        Self { collaborator, options }
    }

    async fn call_with_retry(&self, request: ExtractionRequest<'_>) -> Result<CollaboratorReply> {
        let attempts = self.options.retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.options.timeout, self.collaborator.extract(request)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => last_error = format!("{e:#}"),
                Err(_) => last_error = format!("timed out after {}s", self.options.timeout.as_secs_f32()),
            }
            warn!(attempt, attempts, error = %last_error, "extraction call failed");
        }
        Err(IngestError::Collaborator(last_error))
    }

    async fn extract_document(&self, input: &RawInput, hint: Option<&str>) -> Result<ParseResult> {
        let request = ExtractionRequest {
            file_name: &input.name,
            media_type: &input.media_type,
            bytes: input.bytes(),
            prompt: EXTRACTION_PROMPT,
        };
        info!(file = %input.name, size = input.size, "sending document for extraction");
        let reply = self.call_with_retry(request).await?;
        let result = reply_to_result(reply, hint)?;
        debug!(count = result.transactions.len(), "document extraction validated");
        Ok(result)
    }

    /// Extract transactions from an unstructured statement. Never fails; problems are
    /// reported through the result.
    pub async fn parse_document(&self, input: &RawInput, hint: Option<&str>) -> ParseResult {
        self.extract_document(input, hint)
            .await
            .unwrap_or_else(|e| ParseResult::failure(e.to_string()))
    }
}
