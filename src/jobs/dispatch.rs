//! Asynchronous job submission path.
//!
//! # Responsibilities
//! - Register a new request or coalesce it with an in-flight one
//! - Submit the job body of new requests to the execution service
//! - Remove finished jobs from the registry and record their outcome
//!
//! # Design Decisions
//! - The registry entry is owned by a lease that lives inside the job body;
//!   dropping the body for any reason (completion, failure, panic, rejected submit)
//!   releases the entry
//! - The default matcher can be swapped at runtime on config reload

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::Instrument;

use crate::config::AsyncJobsConfig;
use crate::executor::{BoxError, ExecutionService, ASYNC_JOB};
use crate::jobs::matcher::{MatcherRegistry, RejectPolicy, RequestMatcher};
use crate::jobs::outcome::JobOutcomes;
use crate::jobs::registry::{JobRegistry, JobState, RegisterOutcome};
use crate::jobs::request::{AsyncRequest, JobId};
use crate::jobs::rule::RejectRule;
use crate::observability::metrics;
use crate::observability::tracing::job_span;

/// Body of an asynchronous job.
pub trait AsyncHandler: Send + Sync + 'static {
    fn call(&self, request: AsyncRequest) -> BoxFuture<'static, Result<(), BoxError>>;
}

impl<F, Fut> AsyncHandler for F
where
    F: Fn(AsyncRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn call(&self, request: AsyncRequest) -> BoxFuture<'static, Result<(), BoxError>> {
        Box::pin(self(request))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown request matcher `{name}` (known: {known})")]
    UnknownMatcher { name: String, known: String },
}

/// The matcher applied to routes without their own reject rule.
#[derive(Debug, Clone)]
pub struct MatcherSelection {
    pub name: String,
    pub matcher: Arc<dyn RequestMatcher>,
}

/// Registers asynchronous requests and runs their bodies.
#[derive(Debug)]
pub struct AsyncJobs {
    registry: Arc<JobRegistry>,
    outcomes: JobOutcomes,
    executor: Arc<ExecutionService>,
    matchers: MatcherRegistry,
    default_matcher: ArcSwap<MatcherSelection>,
}

impl AsyncJobs {
    pub fn new(
        config: &AsyncJobsConfig,
        matchers: MatcherRegistry,
        registry: Arc<JobRegistry>,
        executor: Arc<ExecutionService>,
    ) -> Result<Self, DispatchError> {
        let selection = select_matcher(config, &matchers)?;
        tracing::info!(matcher = %selection.name, "Default request matcher selected");

        Ok(Self {
            registry,
            outcomes: JobOutcomes::new(Duration::from_secs(config.outcome_retention_secs)),
            executor,
            matchers,
            default_matcher: ArcSwap::from_pointee(selection),
        })
    }

    /// Register `request` and, unless it coalesces, submit `handler` for it.
    ///
    /// `rule` overrides the default matcher for this route.
    pub fn dispatch(
        &self,
        request: AsyncRequest,
        rule: Option<RejectRule>,
        handler: Arc<dyn AsyncHandler>,
    ) -> RegisterOutcome {
        let handler_name = request.handler().to_string();

        let outcome = match rule {
            Some(rule) => self.registry.try_register(request.clone(), &RejectPolicy::new(rule)),
            None => {
                let selection = self.default_matcher.load();
                self.registry.try_register(request.clone(), selection.matcher.as_ref())
            }
        };

        match outcome {
            RegisterOutcome::Coalesced(existing) => {
                metrics::record_job_coalesced(&handler_name);
                tracing::info!(job_id = %existing, handler = %handler_name, "Async request coalesced");
            }
            RegisterOutcome::New(id) => {
                metrics::record_job_registered(&handler_name);
                tracing::info!(job_id = %id, handler = %handler_name, "Async job queued");

                let lease = JobLease::new(id, Arc::clone(&self.registry), self.outcomes.clone());
                let body = run_job(lease, handler, request).instrument(job_span(id, &handler_name));
                self.executor.submit(body, ASYNC_JOB);
            }
        }

        outcome
    }

    /// Current or recent state of `id`.
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.registry.state(id).or_else(|| self.outcomes.get(&id))
    }

    /// Re-select the default matcher from a reloaded configuration.
    pub fn reload(&self, config: &AsyncJobsConfig) -> Result<(), DispatchError> {
        let selection = select_matcher(config, &self.matchers)?;
        tracing::info!(matcher = %selection.name, "Default request matcher reloaded");
        self.default_matcher.store(Arc::new(selection));
        Ok(())
    }

    pub fn default_matcher_name(&self) -> String {
        self.default_matcher.load().name.clone()
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<ExecutionService> {
        &self.executor
    }
}

fn select_matcher(config: &AsyncJobsConfig, matchers: &MatcherRegistry) -> Result<MatcherSelection, DispatchError> {
    let name = config
        .matcher
        .clone()
        .unwrap_or_else(|| config.default_reject_rule.matcher_name().to_string());

    match matchers.get(&name) {
        Some(matcher) => Ok(MatcherSelection { name, matcher }),
        None => Err(DispatchError::UnknownMatcher {
            known: matchers.names().join(", "),
            name,
        }),
    }
}

async fn run_job(mut lease: JobLease, handler: Arc<dyn AsyncHandler>, request: AsyncRequest) -> Result<(), BoxError> {
    lease.start();
    let result = handler.call(request).await;
    lease.finish(if result.is_ok() { JobState::Completed } else { JobState::Failed });
    result
}

/// Ownership of a registry entry by its job body.
///
/// Dropping the lease records the outcome, `Failed` unless
/// [`finish`](Self::finish) recorded something else, then removes the entry.
#[derive(Debug)]
struct JobLease {
    id: JobId,
    registry: Arc<JobRegistry>,
    outcomes: JobOutcomes,
    state: Option<JobState>,
}

impl JobLease {
    fn new(id: JobId, registry: Arc<JobRegistry>, outcomes: JobOutcomes) -> Self {
        Self {
            id,
            registry,
            outcomes,
            state: None,
        }
    }

    fn start(&self) {
        self.registry.mark_running(self.id);
        tracing::debug!(job_id = %self.id, "Async job running");
    }

    fn finish(&mut self, state: JobState) {
        self.state = Some(state);
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        let state = self.state.take().unwrap_or(JobState::Failed);
        // Outcome first, so the job is never invisible to a feedback poll.
        self.outcomes.record(self.id, state);
        self.registry.complete(self.id);
        metrics::record_job_finished(state);
        tracing::debug!(job_id = %self.id, state = state.as_str(), "Async job finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::jobs::request::{Identity, Route, RouteTarget};
    use tokio::sync::{oneshot, Notify};

    fn jobs(config: AsyncJobsConfig) -> AsyncJobs {
        let executor = Arc::new(ExecutionService::new(&ExecutorConfig { workers: 2 }));
        executor.start();
        AsyncJobs::new(&config, MatcherRegistry::with_builtins(), Arc::new(JobRegistry::new()), executor).unwrap()
    }

    fn request(subject: &str) -> AsyncRequest {
        AsyncRequest::new(Route::new(RouteTarget::new("/sync", "sync")), Identity::present(subject))
    }

    fn blocking_handler(release: Arc<Notify>) -> Arc<dyn AsyncHandler> {
        Arc::new(move |_request: AsyncRequest| {
            let release = Arc::clone(&release);
            async move {
                release.notified().await;
                Ok::<(), BoxError>(())
            }
        })
    }

    async fn wait_for_state(jobs: &AsyncJobs, id: JobId, expected: JobState) {
        for _ in 0..100 {
            if jobs.state(id) == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached {expected:?}, last {:?}", jobs.state(id));
    }

    #[tokio::test]
    async fn coalesces_while_in_flight_and_clears_on_completion() {
        let jobs = jobs(AsyncJobsConfig::default());
        let release = Arc::new(Notify::new());

        let first = jobs.dispatch(request("alice"), None, blocking_handler(Arc::clone(&release)));
        assert!(first.is_new());
        wait_for_state(&jobs, first.id(), JobState::Running).await;

        let second = jobs.dispatch(request("alice"), None, blocking_handler(Arc::clone(&release)));
        assert_eq!(second, RegisterOutcome::Coalesced(first.id()));

        release.notify_one();
        wait_for_state(&jobs, first.id(), JobState::Completed).await;
        assert!(jobs.registry().is_empty());

        let third = jobs.dispatch(request("alice"), None, blocking_handler(Arc::clone(&release)));
        assert!(third.is_new());
        release.notify_one();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn finishing_job_never_disappears_from_state() {
        let jobs = Arc::new(jobs(AsyncJobsConfig::default()));
        let release = Arc::new(Notify::new());
        let id = jobs.dispatch(request("alice"), None, blocking_handler(Arc::clone(&release))).id();
        wait_for_state(&jobs, id, JobState::Running).await;

        let observer = {
            let jobs = Arc::clone(&jobs);
            tokio::task::spawn_blocking(move || loop {
                match jobs.state(id) {
                    Some(JobState::Completed) => return true,
                    Some(_) => std::hint::spin_loop(),
                    None => return false,
                }
            })
        };

        release.notify_one();
        assert!(observer.await.unwrap(), "job {id} had no state while finishing");
        assert!(jobs.registry().is_empty());
    }

    #[tokio::test]
    async fn route_rule_overrides_default_matcher() {
        let jobs = jobs(AsyncJobsConfig::default());
        let release = Arc::new(Notify::new());

        let first = jobs.dispatch(request("alice"), Some(RejectRule::Never), blocking_handler(Arc::clone(&release)));
        let second = jobs.dispatch(request("alice"), Some(RejectRule::Never), blocking_handler(Arc::clone(&release)));
        assert!(first.is_new());
        assert!(second.is_new());
        assert_eq!(jobs.registry().len(), 2);

        release.notify_waiters();
    }

    #[tokio::test]
    async fn failing_job_is_recorded_as_failed() {
        let jobs = jobs(AsyncJobsConfig::default());
        let (tx, rx) = oneshot::channel::<()>();
        let tx = std::sync::Mutex::new(Some(tx));

        let handler: Arc<dyn AsyncHandler> = Arc::new(move |_request: AsyncRequest| {
            let tx = tx.lock().unwrap().take();
            async move {
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
                Err::<(), BoxError>("report generation failed".into())
            }
        });

        let id = jobs.dispatch(request("alice"), None, handler).id();
        rx.await.unwrap();
        wait_for_state(&jobs, id, JobState::Failed).await;
        assert!(jobs.registry().is_empty());
    }

    #[tokio::test]
    async fn rejected_job_releases_its_entry() {
        let jobs = jobs(AsyncJobsConfig::default());
        jobs.executor().shutdown();

        let id = jobs
            .dispatch(request("alice"), None, blocking_handler(Arc::new(Notify::new())))
            .id();
        assert!(jobs.registry().is_empty());
        assert_eq!(jobs.state(id), Some(JobState::Failed));
    }

    #[tokio::test]
    async fn reload_switches_matcher() {
        let jobs = jobs(AsyncJobsConfig::default());
        assert_eq!(jobs.default_matcher_name(), "same-request");

        let config = AsyncJobsConfig {
            matcher: Some("same-route".into()),
            ..AsyncJobsConfig::default()
        };
        jobs.reload(&config).unwrap();
        assert_eq!(jobs.default_matcher_name(), "same-route");

        let bad = AsyncJobsConfig {
            matcher: Some("nope".into()),
            ..AsyncJobsConfig::default()
        };
        assert!(matches!(jobs.reload(&bad), Err(DispatchError::UnknownMatcher { .. })));
        assert_eq!(jobs.default_matcher_name(), "same-route");
    }
}
