//! Asynchronous job subsystem.
//!
//! # Data Flow
//! ```text
//! Async endpoint builds AsyncRequest (request.rs)
//!     → dispatch.rs AsyncJobs::dispatch()
//!     → registry.rs try_register() ── matcher.rs find_match() under the registry lock
//!         ├─ Coalesced(existing id) → caller gets the in-flight id
//!         └─ New(id) → job body submitted to the execution service
//!                      → QUEUED → RUNNING → COMPLETED | FAILED
//!                      → entry removed, outcome.rs keeps the terminal state
//! ```
//!
//! # Design Decisions
//! - Matching and insertion are one atomic step
//! - Reject rules are a closed enum (rule.rs); other policies plug in as named matchers

pub mod dispatch;
pub mod matcher;
pub mod outcome;
pub mod registry;
pub mod request;
pub mod rule;

pub use dispatch::{AsyncHandler, AsyncJobs, DispatchError};
pub use matcher::{MatcherRegistry, RejectPolicy, RequestMatcher, SameRouteMatcher};
pub use registry::{JobRegistry, JobState, QueuedJob, RegisterOutcome};
pub use request::{AsyncRequest, Content, Identity, JobId, Principal, Route, RouteTarget};
pub use rule::RejectRule;
