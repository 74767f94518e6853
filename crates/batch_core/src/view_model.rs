use serde::Serialize;

use crate::registry::Job;
use crate::{JobId, JobState, Progress};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TrackerViewModel {
    pub jobs: Vec<JobRowView>,
    pub job_count: usize,
    /// Jobs still Pending or Polling.
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_results: usize,
    pub dirty: bool,
}

impl TrackerViewModel {
    pub(crate) fn from_rows(jobs: Vec<JobRowView>, dirty: bool) -> Self {
        let count_state = |state: JobState| jobs.iter().filter(|row| row.state == state).count();
        let completed = count_state(JobState::Completed);
        let failed = count_state(JobState::Failed);
        Self {
            job_count: jobs.len(),
            in_flight: jobs.len() - completed - failed,
            completed,
            failed,
            total_results: jobs.iter().map(|row| row.result_count).sum(),
            jobs,
            dirty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRowView {
    pub job_id: JobId,
    pub file_name: String,
    pub state: JobState,
    pub progress: Progress,
    pub result_count: usize,
    pub message: Option<String>,
    pub warning_count: usize,
}

impl JobRowView {
    pub(crate) fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            file_name: job.source.file_name.clone(),
            state: job.state,
            progress: job.progress,
            result_count: job.results.len(),
            message: job.message.clone(),
            warning_count: job.warnings.len(),
        }
    }
}
