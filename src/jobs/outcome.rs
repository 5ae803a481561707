//! Recently finished jobs, kept for the feedback path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::jobs::registry::JobState;
use crate::jobs::request::JobId;

#[derive(Debug, Clone, Copy)]
struct Finished {
    state: JobState,
    at: Instant,
}

/// A thread-safe, time-bounded record of terminal job states.
#[derive(Debug, Clone)]
pub struct JobOutcomes {
    inner: Arc<DashMap<JobId, Finished>>,
    retention: Duration,
}

impl JobOutcomes {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Record the terminal state of `id` and drop entries past retention.
    pub fn record(&self, id: JobId, state: JobState) {
        debug_assert!(state.is_terminal());
        self.prune();
        if self.retention.is_zero() {
            return;
        }
        self.inner.insert(id, Finished { state, at: Instant::now() });
    }

    /// Terminal state of `id`, if it finished within the retention window.
    pub fn get(&self, id: &JobId) -> Option<JobState> {
        self.inner
            .get(id)
            .filter(|finished| finished.at.elapsed() <= self.retention)
            .map(|finished| finished.state)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn prune(&self) {
        let retention = self.retention;
        self.inner.retain(|_, finished| finished.at.elapsed() <= retention);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_terminal_states() {
        let outcomes = JobOutcomes::new(Duration::from_secs(60));
        let done = JobId::new();
        let failed = JobId::new();

        outcomes.record(done, JobState::Completed);
        outcomes.record(failed, JobState::Failed);

        assert_eq!(outcomes.get(&done), Some(JobState::Completed));
        assert_eq!(outcomes.get(&failed), Some(JobState::Failed));
        assert_eq!(outcomes.get(&JobId::new()), None);
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn zero_retention_keeps_nothing() {
        let outcomes = JobOutcomes::new(Duration::ZERO);
        let id = JobId::new();
        outcomes.record(id, JobState::Completed);
        assert_eq!(outcomes.get(&id), None);
        assert!(outcomes.is_empty());
    }

    #[test]
    fn expired_entries_are_pruned() {
        let outcomes = JobOutcomes::new(Duration::from_millis(20));
        let old = JobId::new();
        outcomes.record(old, JobState::Completed);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(outcomes.get(&old), None);

        outcomes.record(JobId::new(), JobState::Completed);
        assert_eq!(outcomes.len(), 1);
    }
}
