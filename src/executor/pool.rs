//! Bounded worker pool.
//!
//! # Responsibilities
//! - Queue submitted units of work without blocking the caller
//! - Run them on a fixed number of worker tasks
//! - Catch and report failures and panics per unit
//! - Stop accepting work on shutdown and let queued units finish
//!
//! # Design Decisions
//! - Construction spawns nothing; workers start in `start()`
//! - One unbounded FIFO queue shared by all workers
//! - A failing unit never takes its worker down

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ExecutorConfig;
use crate::executor::work::{panic_message, BoxError, Task};
use crate::observability::metrics;

/// Point-in-time counters of an [`ExecutionService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub workers: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>;

/// Runs submitted units of work on a bounded pool of tokio tasks.
#[derive(Debug)]
pub struct ExecutionService {
    workers: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Task>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    counters: Arc<Counters>,
}

impl ExecutionService {
    /// Create a stopped service. Nothing is spawned until [`start`](Self::start).
    pub fn new(config: &ExecutorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            workers: config.workers.max(1),
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Spawn the worker tasks. Must be called from within a tokio runtime.
    /// Calling it again is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(rx) = self.receiver.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return;
        };
        let queue: SharedQueue = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for worker in 0..self.workers {
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&self.counters);
            handles.push(tokio::spawn(run_worker(worker, queue, counters)));
        }

        tracing::info!(workers = self.workers, "Execution service started");
    }

    /// Enqueue `work` and return immediately.
    ///
    /// After [`shutdown`](Self::shutdown) the unit is dropped without running.
    pub fn submit<F>(&self, work: F, category: &'static str)
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let task = Task {
            work: Box::pin(work),
            category,
        };

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let accepted = match sender.as_ref() {
            Some(tx) => {
                self.counters.queued.fetch_add(1, Ordering::SeqCst);
                if tx.send(task).is_err() {
                    self.counters.queued.fetch_sub(1, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            }
            None => false,
        };
        drop(sender);

        if !accepted {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            metrics::record_work_rejected(category);
            tracing::warn!(category, "Execution service is shut down, work rejected");
        }
    }

    /// Stop accepting work. Queued and running units still finish.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if sender.is_some() {
            tracing::info!(
                queued = self.counters.queued.load(Ordering::SeqCst),
                active = self.counters.active.load(Ordering::SeqCst),
                "Execution service shutting down"
            );
        }
    }

    /// Wait for every worker to exit. Only returns after [`shutdown`](Self::shutdown).
    pub async fn join(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task ended abnormally");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            workers: self.workers,
            queued: self.counters.queued.load(Ordering::SeqCst),
            active: self.counters.active.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(worker: usize, queue: SharedQueue, counters: Arc<Counters>) {
    tracing::trace!(worker, "Worker started");

    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        counters.queued.fetch_sub(1, Ordering::SeqCst);
        counters.active.fetch_add(1, Ordering::SeqCst);
        let ok = run_task(worker, task).await;
        counters.active.fetch_sub(1, Ordering::SeqCst);

        if ok {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    tracing::trace!(worker, "Worker stopped");
}

async fn run_task(worker: usize, task: Task) -> bool {
    let category = task.category;

    let ok = match AssertUnwindSafe(task.work).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(worker, category, error = %e, "Work unit failed");
            false
        }
        Err(payload) => {
            tracing::error!(
                worker,
                category,
                panic = panic_message(payload.as_ref()),
                "Work unit panicked"
            );
            false
        }
    };

    metrics::record_work_finished(category, ok);
    ok
}
