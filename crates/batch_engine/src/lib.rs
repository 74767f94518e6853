//! Batch tracker engine: service client, submission and per-job poll loops.
mod artifact;
mod client;
mod engine;
mod error;
mod poll;
mod settings;
mod submit;
mod wire;

pub use artifact::{fingerprint, Artifact};
pub use client::{BatchClient, ReqwestBatchClient};
pub use engine::TrackerHandle;
pub use error::{
    ArtifactError, ClientError, PollError, SubmissionError, TrackerError,
    SUBMISSION_FAILED_FALLBACK,
};
pub use poll::{PollExit, PollLoop};
pub use settings::{
    ClientSettings, PollSettings, TrackerSettings, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL,
};
pub use submit::{JobHandle, JobSubmitter};
