use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use batch_logging::{batch_debug, batch_info};
use chrono::{DateTime, Utc};

use crate::view_model::{JobRowView, TrackerViewModel};
use crate::{
    ActiveJobIndex, BatchId, CancellationGate, EventSink, JobId, JobState, PollSnapshot,
    Progress, ResultDeduplicator, ResultRecord, SourceRef, TerminalKind, TrackerEvent,
};

pub const EXTRACTION_FAILED_FALLBACK: &str = "Extraction failed";

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    /// Set once the service accepted the submission.
    pub batch_id: Option<BatchId>,
    pub source: SourceRef,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    /// Surfaced results in arrival order.
    pub results: Vec<ResultRecord>,
    pub progress: Progress,
    /// Failure message once the job is Failed.
    pub message: Option<String>,
    pub notices: Vec<String>,
    pub warnings: Vec<String>,
}

impl Job {
    fn new(id: JobId, source: SourceRef) -> Self {
        Self {
            id,
            batch_id: None,
            source,
            state: JobState::Pending,
            created_at: Utc::now(),
            results: Vec::new(),
            progress: Progress::default(),
            message: None,
            notices: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// What happened to a poll snapshot handed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The job was removed or already terminal; nothing was merged.
    Discarded,
    Merged { new: usize },
    Terminal { kind: TerminalKind, new: usize },
}

#[derive(Debug, Default)]
struct Inner {
    jobs: BTreeMap<JobId, Job>,
    next_id: u64,
    dirty: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    index: ActiveJobIndex,
    dedup: ResultDeduplicator,
    sink: Arc<dyn EventSink>,
}

/// Process-wide table of jobs; the single source of truth the UI renders from.
///
/// Every mutation takes the same lock, and events are emitted while it is
/// held, so a `remove` that has returned is never followed by a notification
/// for that job. Sinks must not call back into the registry.
#[derive(Clone)]
pub struct JobRegistry {
    shared: Arc<Shared>,
}

impl JobRegistry {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                index: ActiveJobIndex::new(),
                dedup: ResultDeduplicator::new(),
                sink,
            }),
        }
    }

    /// Gate reading this registry's active-job index.
    pub fn gate(&self) -> CancellationGate {
        CancellationGate::new(self.shared.index.clone())
    }

    pub fn is_active(&self, job_id: JobId) -> bool {
        self.shared.index.contains(job_id)
    }

    /// Create a Pending job for `source` and mark it wanted.
    ///
    /// If a tracked job that has not failed carries the same fingerprint, the
    /// new job still registers but gets a notice naming the earlier one.
    pub fn register(&self, source: SourceRef) -> JobId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let job_id = JobId(inner.next_id);
        let earlier = inner
            .jobs
            .values()
            .find(|job| {
                job.state != JobState::Failed && job.source.fingerprint == source.fingerprint
            })
            .map(|job| (job.id, job.source.file_name.clone()));

        let mut job = Job::new(job_id, source.clone());
        let resubmitted = earlier.map(|(earlier_id, file_name)| {
            format!("Same content as job {earlier_id} ({file_name})")
        });
        if let Some(message) = &resubmitted {
            job.notices.push(message.clone());
        }
        inner.jobs.insert(job_id, job);
        self.shared.index.insert(job_id);
        inner.dirty = true;
        batch_info!("Registered job {} for {}", job_id, source.file_name);
        self.emit(TrackerEvent::Registered { job_id, source });
        if let Some(message) = resubmitted {
            batch_info!("Job {}: {}", job_id, message);
            self.emit(TrackerEvent::Notice { job_id, message });
        }
        job_id
    }

    /// Record the service-side batch id. Returns false if the job is gone.
    pub fn attach_batch(&self, job_id: JobId, batch_id: BatchId) -> bool {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return false;
        };
        job.batch_id = Some(batch_id);
        inner.dirty = true;
        true
    }

    /// Pending -> Polling. Returns true only when the transition happened.
    pub fn begin_polling(&self, job_id: JobId) -> bool {
        let mut inner = self.lock();
        if !self.shared.index.contains(job_id) {
            return false;
        }
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return false;
        };
        if job.state != JobState::Pending {
            return false;
        }
        job.state = JobState::Polling;
        inner.dirty = true;
        self.emit(TrackerEvent::PollingStarted { job_id });
        true
    }

    /// Merge one poll snapshot: re-check liveness, deduplicate, append, and
    /// apply the terminal transition if the snapshot carries one.
    pub fn apply_snapshot(&self, job_id: JobId, snapshot: &PollSnapshot) -> MergeOutcome {
        let mut inner = self.lock();
        if !self.shared.index.contains(job_id) {
            batch_debug!("Discarding snapshot for removed job {}", job_id);
            return MergeOutcome::Discarded;
        }
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return MergeOutcome::Discarded;
        };
        if job.state.is_terminal() {
            batch_debug!("Discarding snapshot for finished job {}", job_id);
            return MergeOutcome::Discarded;
        }

        let mut changed = false;
        if snapshot.progress.is_known() && snapshot.progress != job.progress {
            job.progress = snapshot.progress;
            changed = true;
            batch_debug!("Job {} {}", job_id, job.progress);
            self.emit(TrackerEvent::Progress {
                job_id,
                current: job.progress.current,
                total: job.progress.total,
            });
        }

        let fresh = self.shared.dedup.filter_new(job_id, &snapshot.results);
        let new = fresh.len();
        changed |= Self::append_records(
            self.shared.sink.as_ref(),
            job,
            fresh,
        );

        if let Some(notice) = snapshot.side_notice.as_deref() {
            if self.shared.dedup.notice_once(job_id) {
                job.notices.push(notice.to_string());
                changed = true;
                self.emit(TrackerEvent::Notice {
                    job_id,
                    message: notice.to_string(),
                });
            }
        }

        let outcome = match snapshot.terminal {
            Some(kind) => {
                if let Some(summary) = snapshot.page_error_summary() {
                    job.warnings.push(summary.clone());
                    self.emit(TrackerEvent::Warning {
                        job_id,
                        message: summary,
                    });
                }
                let message = match kind {
                    TerminalKind::Complete => None,
                    TerminalKind::Error => Some(
                        snapshot
                            .error_message
                            .clone()
                            .filter(|msg| !msg.trim().is_empty())
                            .unwrap_or_else(|| EXTRACTION_FAILED_FALLBACK.to_string()),
                    ),
                };
                Self::finish(self.shared.sink.as_ref(), job, kind, message);
                changed = true;
                MergeOutcome::Terminal { kind, new }
            }
            None => MergeOutcome::Merged { new },
        };

        if changed {
            inner.dirty = true;
        }
        outcome
    }

    /// Append already-deduplicated records to a live job and notify for each.
    /// Returns how many records were appended.
    pub fn merge(&self, job_id: JobId, records: Vec<ResultRecord>) -> usize {
        let mut inner = self.lock();
        if !self.shared.index.contains(job_id) {
            return 0;
        }
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return 0;
        };
        if job.state.is_terminal() {
            return 0;
        }
        let count = records.len();
        if Self::append_records(self.shared.sink.as_ref(), job, records) {
            inner.dirty = true;
        }
        count
    }

    /// Set the final state once. Later calls for the same job are no-ops
    /// and return false.
    pub fn mark_terminal(&self, job_id: JobId, kind: TerminalKind, message: Option<String>) -> bool {
        let mut inner = self.lock();
        if !self.shared.index.contains(job_id) {
            return false;
        }
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return false;
        };
        if job.state.is_terminal() {
            return false;
        }
        Self::finish(self.shared.sink.as_ref(), job, kind, message);
        inner.dirty = true;
        true
    }

    /// Delete the job and close its gate. Any in-flight poll for it stops at
    /// its next check and its pending response is discarded.
    pub fn remove(&self, job_id: JobId) -> bool {
        let mut inner = self.lock();
        let removed = inner.jobs.remove(&job_id).is_some();
        self.shared.index.remove(job_id);
        self.shared.dedup.release(job_id);
        if removed {
            inner.dirty = true;
            batch_info!("Removed job {}", job_id);
        }
        removed
    }

    /// Remove every Completed or Failed job. Returns the removed ids.
    pub fn clear_finished(&self) -> Vec<JobId> {
        let mut inner = self.lock();
        let finished: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|job| job.state.is_terminal())
            .map(|job| job.id)
            .collect();
        for job_id in &finished {
            inner.jobs.remove(job_id);
            self.shared.index.remove(*job_id);
            self.shared.dedup.release(*job_id);
        }
        if !finished.is_empty() {
            inner.dirty = true;
            batch_info!("Cleared {} finished job(s)", finished.len());
        }
        finished
    }

    /// Remove every job, stopping all poll loops. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.jobs.len();
        for job_id in inner.jobs.keys() {
            self.shared.dedup.release(*job_id);
        }
        inner.jobs.clear();
        self.shared.index.clear();
        if count > 0 {
            inner.dirty = true;
            batch_info!("Cleared all {} job(s)", count);
        }
        count
    }

    /// Discard the job's seen-key set once its poll loop has stopped.
    pub fn release_seen_keys(&self, job_id: JobId) {
        self.shared.dedup.release(job_id);
    }

    /// Every job the user has not removed, in registration order.
    pub fn get_active(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn job(&self, job_id: JobId) -> Option<Job> {
        self.lock().jobs.get(&job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every remaining job reached a terminal state.
    pub fn all_settled(&self) -> bool {
        self.lock().jobs.values().all(|job| job.state.is_terminal())
    }

    pub fn view(&self) -> TrackerViewModel {
        let inner = self.lock();
        let jobs: Vec<JobRowView> = inner.jobs.values().map(JobRowView::from_job).collect();
        TrackerViewModel::from_rows(jobs, inner.dirty)
    }

    /// Returns whether anything changed since the previous call, and resets the flag.
    pub fn consume_dirty(&self) -> bool {
        let mut inner = self.lock();
        std::mem::take(&mut inner.dirty)
    }

    fn append_records(sink: &dyn EventSink, job: &mut Job, records: Vec<ResultRecord>) -> bool {
        if records.is_empty() {
            return false;
        }
        for record in records {
            job.results.push(record.clone());
            sink.emit(TrackerEvent::NewResult {
                job_id: job.id,
                record,
                progress: job.progress,
            });
        }
        true
    }

    fn finish(sink: &dyn EventSink, job: &mut Job, kind: TerminalKind, message: Option<String>) {
        job.state = kind.final_state();
        job.message = message.clone();
        batch_info!(
            "Job {} {} with {} result(s)",
            job.id,
            job.state,
            job.results.len()
        );
        sink.emit(TrackerEvent::Terminal {
            job_id: job.id,
            kind,
            message,
        });
    }

    fn emit(&self, event: TrackerEvent) {
        self.shared.sink.emit(event);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
