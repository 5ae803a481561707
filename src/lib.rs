//! HTTP dispatch runtime.
//!
//! Accepts connections on one or more listening contexts, serves them on a
//! bounded worker pool and runs asynchronous handlers as background jobs,
//! coalescing duplicate requests while a matching job is still in flight.

pub mod admin;
pub mod config;
pub mod executor;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::RuntimeConfig;
pub use http::{AppBuilder, AsyncRoute};
pub use lifecycle::{Runtime, RuntimeError, Shutdown};
