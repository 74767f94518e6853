use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::JobId;

/// Live set of jobs whose results are still wanted.
///
/// Shared between the registry, which mutates it on registration and user
/// removal, and every poll loop's gate, which only reads it.
#[derive(Debug, Clone, Default)]
pub struct ActiveJobIndex {
    ids: Arc<RwLock<HashSet<JobId>>>,
}

impl ActiveJobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&job_id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(&self, job_id: JobId) {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id);
    }

    pub(crate) fn remove(&self, job_id: JobId) -> bool {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id)
    }

    pub(crate) fn clear(&self) {
        self.ids.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Per-tick liveness check for a poll loop.
///
/// Holds no state of its own: every call is a fresh read of the shared index.
#[derive(Debug, Clone)]
pub struct CancellationGate {
    index: ActiveJobIndex,
}

impl CancellationGate {
    pub fn new(index: ActiveJobIndex) -> Self {
        Self { index }
    }

    pub fn is_active(&self, job_id: JobId) -> bool {
        self.index.contains(job_id)
    }
}
