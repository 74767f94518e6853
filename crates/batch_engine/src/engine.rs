use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use batch_core::{
    ChannelEventSink, Job, JobId, JobRegistry, TerminalKind, TrackerEvent, TrackerViewModel,
};
use batch_logging::batch_error;

use crate::{
    Artifact, BatchClient, JobSubmitter, PollSettings, ReqwestBatchClient, TrackerError,
    TrackerSettings,
};

enum TrackerCommand {
    Submit { job_id: JobId, artifact: Artifact },
}

/// Owns the tokio runtime that drives submissions and poll loops.
///
/// The UI thread submits and removes jobs synchronously and drains events
/// with [`TrackerHandle::try_recv`]. Dropping the handle stops every loop.
pub struct TrackerHandle {
    cmd_tx: mpsc::Sender<TrackerCommand>,
    event_rx: mpsc::Receiver<TrackerEvent>,
    registry: JobRegistry,
}

impl TrackerHandle {
    pub fn new(settings: TrackerSettings) -> Result<Self, TrackerError> {
        let client = ReqwestBatchClient::new(&settings.client, settings.key_policy)?;
        Self::with_client(Arc::new(client), settings.poll)
    }

    pub fn with_client(
        client: Arc<dyn BatchClient>,
        poll: PollSettings,
    ) -> Result<Self, TrackerError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<TrackerCommand>();
        let (event_tx, event_rx) = mpsc::channel();
        let registry = JobRegistry::new(Arc::new(ChannelEventSink::new(event_tx)));
        let submitter = JobSubmitter::new(client, registry.clone(), poll);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                let submitter = submitter.clone();
                runtime.spawn(async move {
                    handle_command(&submitter, command).await;
                });
            }
        });

        Ok(Self {
            cmd_tx,
            event_rx,
            registry,
        })
    }

    /// Register the artifact and queue its submission. The returned id is
    /// valid immediately.
    pub fn submit(&self, artifact: Artifact) -> JobId {
        let job_id = self.registry.register(artifact.source.clone());
        if self
            .cmd_tx
            .send(TrackerCommand::Submit { job_id, artifact })
            .is_err()
        {
            batch_error!("Tracker runtime is gone; job {} cannot be submitted", job_id);
            self.registry.mark_terminal(
                job_id,
                TerminalKind::Error,
                Some("Tracker is shutting down".to_string()),
            );
        }
        job_id
    }

    /// Remove a job; its poll loop stops at the next tick.
    pub fn remove_job(&self, job_id: JobId) -> bool {
        self.registry.remove(job_id)
    }

    pub fn clear_finished(&self) -> Vec<JobId> {
        self.registry.clear_finished()
    }

    pub fn clear_all(&self) -> usize {
        self.registry.clear_all()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.registry.get_active()
    }

    pub fn view(&self) -> TrackerViewModel {
        self.registry.view()
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn try_recv(&self) -> Option<TrackerEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<TrackerEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(submitter: &JobSubmitter, command: TrackerCommand) {
    match command {
        TrackerCommand::Submit { job_id, artifact } => {
            // Failures are already recorded on the job by the submitter.
            if let Ok(handle) = submitter.submit_registered(job_id, &artifact).await {
                handle.finished().await;
            }
        }
    }
}
