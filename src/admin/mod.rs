//! Admin API.
//!
//! # Data Flow
//! ```text
//! Admin context acceptor
//!     → auth.rs (Bearer api_key)
//!     → handlers.rs
//!         ├─ /admin/status    → uptime, connections, matcher, registry size
//!         ├─ /admin/jobs      → registry snapshot
//!         ├─ /admin/jobs/{id} → state of one job
//!         └─ /admin/executor  → executor counters
//! ```
//!
//! # Design Decisions
//! - Served on its own context so it never shares a port with the application
//! - Read-only

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::{middleware, Router};

use crate::jobs::AsyncJobs;
use crate::net::ConnectionTracker;

use self::auth::admin_auth_middleware;
use self::handlers::{get_executor, get_job, get_jobs, get_status};

/// Shared state of the admin handlers.
#[derive(Debug, Clone)]
pub struct AdminState {
    pub jobs: Arc<AsyncJobs>,
    pub connections: ConnectionTracker,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(jobs: Arc<AsyncJobs>, connections: ConnectionTracker, api_key: &str) -> Self {
        Self {
            jobs,
            connections,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/jobs", get(get_jobs))
        .route("/admin/jobs/{id}", get(get_job))
        .route("/admin/executor", get(get_executor))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
