//! HTTP application subsystem.
//!
//! # Data Flow
//! ```text
//! Connection unit (net::connection)
//!     → middleware (trace, request ID, timeout)
//!     → app.rs Router for the context
//!         ├─ ordinary routes → answered on the connection
//!         ├─ async routes → async_route.rs → jobs::AsyncJobs::dispatch() → 202 Accepted
//!         └─ feedback route → feedback.rs → job state
//! ```
//!
//! # Design Decisions
//! - Async endpoints never wait for the job body
//! - Caller identity is resolved from headers by a pluggable resolver (identity.rs)

pub mod app;
pub mod async_route;
pub mod feedback;
pub mod identity;

pub use app::AppBuilder;
pub use async_route::{handler_fn, Accepted, AsyncRoute};
pub use feedback::JobStatus;
pub use identity::{AnonymousIdentity, BearerIdentity, IdentityResolver};
