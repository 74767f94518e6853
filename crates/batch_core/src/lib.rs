//! Batch tracker core: job registry, result deduplication and liveness gating.
//!
//! Everything here is synchronous and free of IO; the engine crate drives it
//! from its poll loops.
mod active;
mod dedup;
mod event;
mod record;
mod registry;
mod types;
mod view_model;

pub use active::{ActiveJobIndex, CancellationGate};
pub use dedup::{ResultDeduplicator, SeenKeySet};
pub use event::{ChannelEventSink, EventSink, NullEventSink, TrackerEvent};
pub use record::{KeyPolicy, PageError, PollSnapshot, ResultKey, ResultRecord, DEFAULT_KEY_FIELD};
pub use registry::{Job, JobRegistry, MergeOutcome, EXTRACTION_FAILED_FALLBACK};
pub use types::{BatchId, JobId, JobState, MediaKind, Progress, SourceRef, TerminalKind};
pub use view_model::{JobRowView, TrackerViewModel};
