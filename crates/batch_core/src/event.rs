use std::sync::mpsc;

use serde::Serialize;

use crate::{JobId, Progress, ResultRecord, SourceRef, TerminalKind};

/// Notifications delivered to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    Registered {
        job_id: JobId,
        source: SourceRef,
    },
    PollingStarted {
        job_id: JobId,
    },
    /// Fired once per newly deduplicated record.
    NewResult {
        job_id: JobId,
        record: ResultRecord,
        progress: Progress,
    },
    Progress {
        job_id: JobId,
        current: u32,
        total: u32,
    },
    /// One-off informational message, e.g. the source already existed in storage.
    Notice {
        job_id: JobId,
        message: String,
    },
    /// Non-fatal problem such as pages that could not be extracted.
    Warning {
        job_id: JobId,
        message: String,
    },
    Terminal {
        job_id: JobId,
        kind: TerminalKind,
        message: Option<String>,
    },
}

impl TrackerEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            TrackerEvent::Registered { job_id, .. }
            | TrackerEvent::PollingStarted { job_id }
            | TrackerEvent::NewResult { job_id, .. }
            | TrackerEvent::Progress { job_id, .. }
            | TrackerEvent::Notice { job_id, .. }
            | TrackerEvent::Warning { job_id, .. }
            | TrackerEvent::Terminal { job_id, .. } => *job_id,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: TrackerEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<TrackerEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<TrackerEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: TrackerEvent) {}
}
