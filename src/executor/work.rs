//! Units of work and their failure reporting.

use std::any::Any;

use futures_util::future::BoxFuture;

/// Error returned by a failing unit of work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of work: a boxed future run once by a worker.
pub type WorkUnit = BoxFuture<'static, Result<(), BoxError>>;

/// Category of per-connection handling units.
pub const CONNECTION: &str = "connection";

/// Category of asynchronous job bodies.
pub const ASYNC_JOB: &str = "async-job";

/// A queued unit of work with its diagnostic label.
pub(crate) struct Task {
    pub(crate) work: WorkUnit,
    pub(crate) category: &'static str,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("category", &self.category).finish_non_exhaustive()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
