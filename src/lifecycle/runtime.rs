//! Runtime assembly and lifecycle.
//!
//! # Responsibilities
//! - Wire the executor, job registry and acceptors from configuration
//! - Start them in dependency order and stop them in reverse
//! - Apply configuration reloads that can change without a restart
//!
//! # Design Decisions
//! - `new()` does no I/O; binding happens in `start()`
//! - A context that fails to bind stops the ones already started
//! - Stopping acceptors closes their connections gracefully, so `stop()` does
//!   not wait on idle clients
//! - Stopping acceptors does not cancel jobs; the executor drains its queue

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, RuntimeConfig};
use crate::executor::ExecutionService;
use crate::http::AppBuilder;
use crate::jobs::{AsyncJobs, DispatchError, JobRegistry};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Acceptor, AcceptorError, ConnectionTracker};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Acceptor(#[from] AcceptorError),
    #[error("runtime was already started")]
    AlreadyStarted,
}

/// The assembled server: one acceptor per context sharing one executor.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    jobs: Arc<AsyncJobs>,
    executor: Arc<ExecutionService>,
    connections: ConnectionTracker,
    acceptors: Vec<Acceptor>,
    shutdown: Shutdown,
    started: AtomicBool,
}

impl Runtime {
    /// Assemble the runtime. `config` is validated here as well, since it
    /// need not come from a file.
    pub fn new(config: RuntimeConfig, app: AppBuilder) -> Result<Self, RuntimeError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let executor = Arc::new(ExecutionService::new(&config.executor));
        let jobs = Arc::new(AsyncJobs::new(
            &config.async_jobs,
            app.matchers().clone(),
            Arc::new(JobRegistry::new()),
            Arc::clone(&executor),
        )?);
        let connections = ConnectionTracker::new();

        let mut acceptors: Vec<Acceptor> = config
            .contexts
            .iter()
            .map(|context| {
                let router = app.build(Arc::clone(&jobs), &config, context);
                Acceptor::new(
                    context.clone(),
                    &config.listener,
                    router,
                    Arc::clone(&executor),
                    connections.clone(),
                )
            })
            .collect();

        if config.admin.enabled {
            let state = AdminState::new(Arc::clone(&jobs), connections.clone(), &config.admin.api_key);
            acceptors.push(Acceptor::new(
                config.admin.context(),
                &config.listener,
                setup_admin_router(state),
                Arc::clone(&executor),
                connections.clone(),
            ));
        }

        Ok(Self {
            config,
            jobs,
            executor,
            connections,
            acceptors,
            shutdown: Shutdown::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Start the executor, then every acceptor. Returns the bound addresses
    /// in context order (admin last).
    pub async fn start(&self) -> Result<Vec<SocketAddr>, RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyStarted);
        }

        self.executor.start();

        let mut addresses = Vec::with_capacity(self.acceptors.len());
        for acceptor in &self.acceptors {
            match acceptor.start().await {
                Ok(address) => addresses.push(address),
                Err(e) => {
                    tracing::error!(context = %acceptor.context().name, error = %e, "Context failed to start");
                    self.stop().await;
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            contexts = self.acceptors.len(),
            workers = self.config.executor.workers,
            matcher = %self.jobs.default_matcher_name(),
            "Runtime started"
        );
        Ok(addresses)
    }

    /// Stop accepting on every context, then drain and join the executor.
    pub async fn stop(&self) {
        for acceptor in &self.acceptors {
            acceptor.stop();
        }
        for acceptor in &self.acceptors {
            acceptor.wait_stopped().await;
        }

        self.shutdown.trigger();
        self.executor.shutdown();
        self.executor.join().await;

        tracing::info!(
            pending_jobs = self.jobs.registry().len(),
            active_connections = self.connections.active_count(),
            "Runtime stopped"
        );
    }

    /// Apply the parts of `config` that can change at runtime.
    ///
    /// Only the async job matcher selection is reloadable; listener and
    /// context changes take effect on restart.
    pub fn reload(&self, config: &RuntimeConfig) -> Result<(), RuntimeError> {
        self.jobs.reload(&config.async_jobs)?;

        let contexts_changed = config.contexts.len() != self.config.contexts.len()
            || config
                .contexts
                .iter()
                .zip(&self.config.contexts)
                .any(|(new, old)| {
                    new.name != old.name
                        || new.effective_port() != old.effective_port()
                        || new.path != old.path
                });
        if contexts_changed {
            tracing::warn!("Context changes require a restart and were not applied");
        }
        Ok(())
    }

    /// Bound address of the context named `name`, once started.
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.acceptors
            .iter()
            .find(|acceptor| acceptor.context().name == name)
            .and_then(Acceptor::local_addr)
    }

    pub fn jobs(&self) -> &Arc<AsyncJobs> {
        &self.jobs
    }

    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
