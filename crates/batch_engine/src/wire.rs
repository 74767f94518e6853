//! JSON bodies exchanged with the extraction service.

use batch_core::{KeyPolicy, PageError, PollSnapshot, Progress, ResultRecord, TerminalKind};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(alias = "id", alias = "batch_id")]
    pub job_id: String,
}

/// Error body of a non-2xx response. FastAPI-style services put the text in `detail`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    pub fn parse(body: &[u8]) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
        parsed.into_message()
    }

    fn into_message(self) -> Option<String> {
        let detail = self.detail.and_then(|detail| match detail {
            Value::String(text) => Some(text),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        detail
            .or(self.message)
            .or(self.error)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Every field may be missing or `null`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<WireProgress>,
    #[serde(default)]
    results: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    page_errors: Option<Vec<WirePageError>>,
    #[serde(default)]
    storage_existed: Option<bool>,
    #[serde(default)]
    storage_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireProgress {
    #[serde(default)]
    current: Option<u32>,
    #[serde(default)]
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePageError {
    Detailed {
        #[serde(default)]
        page: Option<u32>,
        #[serde(default, alias = "message")]
        error: Option<String>,
    },
    Message(String),
    Other(Value),
}

impl WirePageError {
    fn into_page_error(self) -> Option<PageError> {
        match self {
            WirePageError::Detailed { page, error } => Some(PageError {
                page,
                message: error
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| "unknown error".to_string()),
            }),
            WirePageError::Message(message) => Some(PageError {
                page: None,
                message,
            }),
            WirePageError::Other(Value::Null) => None,
            WirePageError::Other(other) => Some(PageError {
                page: None,
                message: other.to_string(),
            }),
        }
    }
}

impl StatusResponse {
    pub fn into_snapshot(self, policy: &KeyPolicy) -> PollSnapshot {
        let error_message = self
            .error
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let terminal = match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("completed" | "complete" | "done" | "success") => Some(TerminalKind::Complete),
            Some("error" | "failed") => Some(TerminalKind::Error),
            _ if error_message.is_some() => Some(TerminalKind::Error),
            _ => None,
        };
        let progress = self
            .progress
            .map(|p| Progress::new(p.current.unwrap_or(0), p.total.unwrap_or(0)))
            .unwrap_or_default();
        let results = self
            .results
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(position, document)| ResultRecord::from_document(document, position, policy))
            .collect();
        let side_notice = self.storage_existed.unwrap_or(false).then(|| match self.storage_url {
            Some(url) => format!("File already existed in storage: {url}"),
            None => "File already existed in storage".to_string(),
        });

        PollSnapshot {
            progress,
            results,
            terminal,
            error_message,
            page_errors: self
                .page_errors
                .unwrap_or_default()
                .into_iter()
                .filter_map(WirePageError::into_page_error)
                .collect(),
            side_notice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_core::ResultKey;

    fn parse(body: &str) -> PollSnapshot {
        serde_json::from_str::<StatusResponse>(body)
            .unwrap()
            .into_snapshot(&KeyPolicy::default())
    }

    #[test]
    fn running_status_is_not_terminal() {
        let snapshot = parse(
            r#"{"status":"processing","progress":{"current":1,"total":4},
                "results":[{"po_number":"PO-1"}]}"#,
        );
        assert_eq!(snapshot.terminal, None);
        assert_eq!(snapshot.progress, Progress::new(1, 4));
        assert_eq!(snapshot.results[0].key, ResultKey::Natural("PO-1".into()));
    }

    #[test]
    fn completed_status_carries_page_errors_and_notice() {
        let snapshot = parse(
            r#"{"status":"completed","results":[],
                "page_errors":[{"page":2,"error":"blank"},"page 5 timed out"],
                "storage_existed":true,"storage_url":"https://files/po.pdf"}"#,
        );
        assert_eq!(snapshot.terminal, Some(TerminalKind::Complete));
        assert_eq!(snapshot.page_errors.len(), 2);
        assert_eq!(snapshot.page_errors[0].page, Some(2));
        assert_eq!(snapshot.page_errors[1].message, "page 5 timed out");
        assert_eq!(
            snapshot.side_notice.as_deref(),
            Some("File already existed in storage: https://files/po.pdf")
        );
    }

    #[test]
    fn error_field_is_terminal_even_without_status() {
        let snapshot = parse(r#"{"error":"Gemini quota exceeded"}"#);
        assert_eq!(snapshot.terminal, Some(TerminalKind::Error));
        assert_eq!(snapshot.error_message.as_deref(), Some("Gemini quota exceeded"));
    }

    #[test]
    fn empty_body_is_a_pending_snapshot() {
        let snapshot = parse("{}");
        assert_eq!(snapshot, PollSnapshot::default());
    }

    #[test]
    fn null_fields_decode_as_absent() {
        let snapshot = parse(
            r#"{"status":"completed","progress":{"current":1,"total":null},
                "results":null,"error":null,"page_errors":null,
                "storage_existed":null,"storage_url":null}"#,
        );
        assert_eq!(
            snapshot,
            PollSnapshot {
                terminal: Some(TerminalKind::Complete),
                ..PollSnapshot::default()
            }
        );
    }

    #[test]
    fn odd_page_error_entries_are_tolerated() {
        let snapshot = parse(
            r#"{"status":"completed",
                "page_errors":[null,{"page":3,"error":null},{"page":4},7]}"#,
        );
        let messages: Vec<_> = snapshot.page_errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec!["page 3: unknown error", "page 4: unknown error", "7"]
        );
    }

    #[test]
    fn error_body_prefers_detail() {
        assert_eq!(
            ErrorBody::parse(br#"{"detail":"Unsupported file format"}"#).as_deref(),
            Some("Unsupported file format")
        );
        assert_eq!(
            ErrorBody::parse(br#"{"message":"  quota  "}"#).as_deref(),
            Some("quota")
        );
        assert_eq!(ErrorBody::parse(br#"{"detail":""}"#), None);
        assert_eq!(ErrorBody::parse(b"<html>502</html>"), None);
    }
}
