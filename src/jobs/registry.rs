//! Registry of in-flight asynchronous jobs.
//!
//! # Responsibilities
//! - Own the insertion-ordered map of queued and running requests
//! - Run the match decision and the insert as one critical section
//! - Track the lifecycle state of each entry until it completes
//!
//! # Design Decisions
//! - A single `std::sync::Mutex`, never held across an await point
//! - Removal is its own critical section; it does not race with matching
//! - A poisoned lock is recovered: every critical section leaves the map consistent

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::jobs::matcher::RequestMatcher;
use crate::jobs::request::{AsyncRequest, JobId};
use crate::observability::metrics;

/// Lifecycle state of an asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Registered, waiting for a worker.
    Queued,
    /// Picked up by a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error, a panic, or was never run.
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }
}

/// Result of [`JobRegistry::try_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The request was inserted under its own id.
    New(JobId),
    /// An equivalent request is already in flight; nothing was inserted.
    Coalesced(JobId),
}

impl RegisterOutcome {
    pub fn id(&self) -> JobId {
        match self {
            RegisterOutcome::New(id) | RegisterOutcome::Coalesced(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RegisterOutcome::New(_))
    }
}

/// A registry entry as seen by a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub request: AsyncRequest,
    pub state: JobState,
}

#[derive(Debug, Default)]
struct Queued {
    requests: Vec<AsyncRequest>,
    states: HashMap<JobId, JobState>,
}

/// Process-wide table of in-flight asynchronous requests.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: Mutex<Queued>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queued> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `request` unless `matcher` finds an equivalent queued request.
    pub fn try_register(&self, request: AsyncRequest, matcher: &dyn RequestMatcher) -> RegisterOutcome {
        let mut queued = self.lock();

        if let Some(existing) = matcher.find_match(&request, &queued.requests) {
            tracing::debug!(
                job_id = %existing,
                handler = %request.handler(),
                "Request coalesced with in-flight job"
            );
            return RegisterOutcome::Coalesced(existing);
        }

        let id = request.id;
        queued.states.insert(id, JobState::Queued);
        queued.requests.push(request);
        metrics::record_registry_size(queued.requests.len());

        RegisterOutcome::New(id)
    }

    /// Move `id` from `Queued` to `Running`. Returns false if the id is not registered.
    pub fn mark_running(&self, id: JobId) -> bool {
        let mut queued = self.lock();
        match queued.states.get_mut(&id) {
            Some(state) => {
                *state = JobState::Running;
                true
            }
            None => false,
        }
    }

    /// Remove `id`. Absent ids are ignored.
    pub fn complete(&self, id: JobId) -> Option<AsyncRequest> {
        let mut queued = self.lock();
        queued.states.remove(&id)?;

        let position = queued.requests.iter().position(|r| r.id == id)?;
        let request = queued.requests.remove(position);
        metrics::record_registry_size(queued.requests.len());

        Some(request)
    }

    /// Lifecycle state of a registered job.
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.lock().states.get(&id).copied()
    }

    /// Point-in-time copy of all entries, in insertion order.
    pub fn snapshot(&self) -> Vec<QueuedJob> {
        let queued = self.lock();
        queued
            .requests
            .iter()
            .map(|request| QueuedJob {
                request: request.clone(),
                state: queued.states.get(&request.id).copied().unwrap_or(JobState::Queued),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
