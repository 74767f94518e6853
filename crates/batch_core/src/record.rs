use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Progress, TerminalKind};

pub const DEFAULT_KEY_FIELD: &str = "po_number";

/// Identifier used to decide whether a result has already been surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultKey {
    /// Natural key taken from the document content, e.g. a PO number.
    Natural(String),
    /// Position in the accumulated result list, used when the natural key is missing.
    Positional(usize),
    /// Reserved key for the "storage already existed" notice.
    StorageNotice,
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKey::Natural(key) => f.write_str(key),
            ResultKey::Positional(index) => write!(f, "#{index}"),
            ResultKey::StorageNotice => f.write_str("<storage-notice>"),
        }
    }
}

/// Which document field carries the natural result key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    pub field: String,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            field: DEFAULT_KEY_FIELD.to_string(),
        }
    }
}

impl KeyPolicy {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Derive the key for the document at `position`.
    ///
    /// Blank or missing natural keys never share a key with each other; they
    /// fall back to their position in the accumulated list. That relies on
    /// the service only appending to the list: a keyless record that moves
    /// to another position is surfaced again under its new key.
    pub fn key_for(&self, document: &Value, position: usize) -> ResultKey {
        match document.get(&self.field) {
            Some(Value::String(raw)) if !raw.trim().is_empty() => {
                ResultKey::Natural(raw.trim().to_string())
            }
            Some(Value::Number(number)) => ResultKey::Natural(number.to_string()),
            _ => ResultKey::Positional(position),
        }
    }
}

/// One unit of extracted output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub key: ResultKey,
    pub position: usize,
    /// Extracted document fields as returned by the service.
    pub fields: Value,
    /// The service already holds a saved document with this key.
    pub already_exists: bool,
    pub duplicate_message: Option<String>,
}

impl ResultRecord {
    pub fn from_document(document: Value, position: usize, policy: &KeyPolicy) -> Self {
        let key = policy.key_for(&document, position);
        let already_exists = document
            .get("already_exists")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let duplicate_message = document
            .get("duplicate_message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        Self {
            key,
            position,
            fields: document,
            already_exists,
            duplicate_message,
        }
    }

    /// Convenience accessor for string fields of the extracted document.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// A page the service could not extract; non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub page: Option<u32>,
    pub message: String,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "page {page}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of one status poll. Transient: merged and then dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollSnapshot {
    pub progress: Progress,
    /// Full accumulated result list, not a delta.
    pub results: Vec<ResultRecord>,
    pub terminal: Option<TerminalKind>,
    pub error_message: Option<String>,
    pub page_errors: Vec<PageError>,
    /// e.g. "source already existed in storage".
    pub side_notice: Option<String>,
}

impl PollSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// One-line summary of page errors, or `None` when every page was extracted.
    pub fn page_error_summary(&self) -> Option<String> {
        if self.page_errors.is_empty() {
            return None;
        }
        let details = self
            .page_errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Some(format!(
            "{} page(s) could not be extracted: {details}",
            self.page_errors.len()
        ))
    }
}
