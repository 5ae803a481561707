//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! acceptor, executor, job registry
//!     → tracing.rs (connection and async_job spans)
//!     → logging.rs (fmt subscriber, EnvFilter)
//!     → metrics.rs (dispatch_* counters, registry size gauge)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape of the exporter (when enabled)
//! ```
//!
//! # Design Decisions
//! - Job and connection ids are span fields, not repeated in every event
//! - Recording a metric without an installed exporter is a no-op

pub mod logging;
pub mod metrics;
pub mod tracing;
