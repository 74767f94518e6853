use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use crate::{JobId, ResultKey, ResultRecord};

/// Result keys already surfaced for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenKeySet {
    keys: HashSet<ResultKey>,
}

impl SeenKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key was not seen before.
    pub fn insert(&mut self, key: ResultKey) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &ResultKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Makes repeated polls idempotent by remembering surfaced keys per job.
#[derive(Debug, Default)]
pub struct ResultDeduplicator {
    seen: Mutex<HashMap<JobId, SeenKeySet>>,
}

impl ResultDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records whose key has not been surfaced for `job_id` yet,
    /// in input order, and records their keys before returning.
    ///
    /// A key repeated inside one batch surfaces once, at its first occurrence.
    pub fn filter_new(&self, job_id: JobId, results: &[ResultRecord]) -> Vec<ResultRecord> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let keys = seen.entry(job_id).or_default();
        results
            .iter()
            .filter(|record| keys.insert(record.key.clone()))
            .cloned()
            .collect()
    }

    /// Returns true the first time it is called for `job_id`.
    pub fn notice_once(&self, job_id: JobId) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.entry(job_id)
            .or_default()
            .insert(ResultKey::StorageNotice)
    }

    pub fn seen_count(&self, job_id: JobId) -> usize {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.get(&job_id).map_or(0, SeenKeySet::len)
    }

    /// Discards the job's key set.
    pub fn release(&self, job_id: JobId) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.remove(&job_id);
    }

    pub fn tracked_jobs(&self) -> usize {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.len()
    }
}
