//! Execution subsystem.
//!
//! # Data Flow
//! ```text
//! Acceptor (connection units) ─┐
//!                              ├→ pool.rs submit() → FIFO queue → N workers
//! Async jobs (job bodies) ─────┘                                   │
//!                                                                  → catch error/panic → log + metrics
//! ```
//!
//! # Design Decisions
//! - Submission never blocks and returns nothing to the caller
//! - Worker count bounds concurrency, not queue length
//! - Categories are labels for logs and metrics only

pub mod pool;
pub mod work;

pub use pool::{ExecutionService, ExecutorStats};
pub use work::{BoxError, WorkUnit, ASYNC_JOB, CONNECTION};
