use std::sync::Arc;

use batch_core::{BatchId, JobId, JobRegistry, TerminalKind};
use batch_logging::{batch_info, batch_warn};
use tokio::task::JoinHandle;

use crate::{Artifact, BatchClient, PollExit, PollLoop, PollSettings, SubmissionError};

/// A job the service accepted, with its running poll loop.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    pub batch_id: BatchId,
    poll_task: JoinHandle<PollExit>,
}

impl JobHandle {
    /// Wait for the poll loop to stop.
    pub async fn finished(self) -> PollExit {
        match self.poll_task.await {
            Ok(exit) => exit,
            Err(err) => {
                batch_warn!("Poll task for job {} ended abnormally: {}", self.job_id, err);
                PollExit::Cancelled
            }
        }
    }
}

/// Turns artifacts into accepted jobs and starts their poll loops.
#[derive(Clone)]
pub struct JobSubmitter {
    client: Arc<dyn BatchClient>,
    registry: JobRegistry,
    poll: PollSettings,
}

impl JobSubmitter {
    pub fn new(client: Arc<dyn BatchClient>, registry: JobRegistry, poll: PollSettings) -> Self {
        Self {
            client,
            registry,
            poll,
        }
    }

    /// Register and submit in one step.
    pub async fn submit(&self, artifact: &Artifact) -> Result<JobHandle, SubmissionError> {
        let job_id = self.register(artifact);
        self.submit_registered(job_id, artifact).await
    }

    /// Create the Pending job so callers get its id before any network IO.
    pub fn register(&self, artifact: &Artifact) -> JobId {
        self.registry.register(artifact.source.clone())
    }

    /// Submit an already registered job. Never retries.
    ///
    /// On failure the job is marked Failed and no poll loop starts. Must be
    /// called from within a tokio runtime.
    pub async fn submit_registered(
        &self,
        job_id: JobId,
        artifact: &Artifact,
    ) -> Result<JobHandle, SubmissionError> {
        batch_info!(
            "Submitting job {} ({}, {} bytes)",
            job_id,
            artifact.source.file_name,
            artifact.source.byte_len
        );

        match self.client.submit_batch(artifact).await {
            Ok(batch_id) => {
                batch_info!("Job {} accepted as batch {}", job_id, batch_id);
                self.registry.attach_batch(job_id, batch_id.clone());
                let poll_loop = PollLoop::new(
                    self.client.clone(),
                    self.registry.clone(),
                    self.poll.clone(),
                );
                let loop_batch = batch_id.clone();
                let poll_task = tokio::spawn(async move { poll_loop.run(job_id, loop_batch).await });
                Ok(JobHandle {
                    job_id,
                    batch_id,
                    poll_task,
                })
            }
            Err(err) => {
                batch_warn!("Job {} submission failed: {}", job_id, err);
                self.registry
                    .mark_terminal(job_id, TerminalKind::Error, Some(err.user_message()));
                Err(err)
            }
        }
    }
}
