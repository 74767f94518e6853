use std::sync::Arc;
use std::time::Duration;

use batch_core::{BatchId, CancellationGate, JobId, JobRegistry, JobState, MergeOutcome, TerminalKind};
use batch_logging::{batch_debug, batch_info, batch_trace, batch_warn};
use tokio::time::{self, MissedTickBehavior};

use crate::{BatchClient, PollSettings};

/// `tokio::time::interval` panics on a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Why a poll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Completed,
    Failed,
    /// The job was removed; its results are no longer wanted.
    Cancelled,
}

/// Timer-driven status poller for one job.
///
/// Ticks are strictly sequential: the next fetch starts only after the
/// previous snapshot was merged.
#[derive(Clone)]
pub struct PollLoop {
    client: Arc<dyn BatchClient>,
    registry: JobRegistry,
    gate: CancellationGate,
    settings: PollSettings,
}

impl PollLoop {
    pub fn new(client: Arc<dyn BatchClient>, registry: JobRegistry, settings: PollSettings) -> Self {
        let gate = registry.gate();
        Self {
            client,
            registry,
            gate,
            settings,
        }
    }

    /// Poll `batch_id` until it is terminal or `job_id` is removed.
    pub async fn run(&self, job_id: JobId, batch_id: BatchId) -> PollExit {
        let exit = self.poll_until_done(job_id, &batch_id).await;
        self.registry.release_seen_keys(job_id);
        batch_debug!("Poll loop for job {} (batch {}) stopped: {:?}", job_id, batch_id, exit);
        exit
    }

    async fn poll_until_done(&self, job_id: JobId, batch_id: &BatchId) -> PollExit {
        let mut ticker = time::interval(self.settings.interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            ticker.tick().await;
            if !self.gate.is_active(job_id) {
                batch_info!("Job {} no longer wanted; stopping after {} poll(s)", job_id, tick);
                return PollExit::Cancelled;
            }
            if tick == 0 {
                self.registry.begin_polling(job_id);
            }
            tick += 1;
            batch_trace!("Job {} poll tick {}", job_id, tick);

            let snapshot = match self.client.get_batch_status(batch_id).await {
                Ok(snapshot) => {
                    consecutive_failures = 0;
                    snapshot
                }
                Err(err) => {
                    consecutive_failures += 1;
                    batch_warn!(
                        "Job {} status poll failed ({} in a row), retrying: {}",
                        job_id,
                        consecutive_failures,
                        err
                    );
                    continue;
                }
            };

            match self.registry.apply_snapshot(job_id, &snapshot) {
                MergeOutcome::Discarded => return self.exit_for_discarded(job_id),
                MergeOutcome::Merged { new } => {
                    if new > 0 {
                        batch_debug!("Job {} surfaced {} new result(s)", job_id, new);
                    }
                }
                MergeOutcome::Terminal { kind, .. } => {
                    return match kind {
                        TerminalKind::Complete => PollExit::Completed,
                        TerminalKind::Error => PollExit::Failed,
                    };
                }
            }
        }
    }

    fn exit_for_discarded(&self, job_id: JobId) -> PollExit {
        match self.registry.job(job_id).map(|job| job.state) {
            Some(JobState::Completed) => PollExit::Completed,
            Some(JobState::Failed) => PollExit::Failed,
            _ => PollExit::Cancelled,
        }
    }
}
