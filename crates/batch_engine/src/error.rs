use std::io;

use thiserror::Error;

pub const SUBMISSION_FAILED_FALLBACK: &str = "Failed to submit document for extraction";

/// The service never accepted the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("submission rejected with http status {status}: {}", .message.as_deref().unwrap_or(SUBMISSION_FAILED_FALLBACK))]
    Rejected { status: u16, message: Option<String> },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid submission response: {0}")]
    InvalidResponse(String),
}

impl SubmissionError {
    /// Message shown to the user: the server's own text when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Rejected {
                message: Some(message),
                ..
            } => message.clone(),
            _ => SUBMISSION_FAILED_FALLBACK.to_string(),
        }
    }
}

/// One failed status poll. Never terminal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("network error: {0}")]
    Network(String),
    #[error("status request timed out")]
    Timeout,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("undecodable status response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("http client setup failed: {0}")]
    Build(String),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("unsupported file type: {0}")]
    UnsupportedMedia(String),
    #[error("empty file: {0}")]
    Empty(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] io::Error),
}
