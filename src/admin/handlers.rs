use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::executor::ExecutorStats;
use crate::http::JobStatus;
use crate::jobs::{JobId, QueuedJob};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub active_connections: u64,
    pub accepted_connections: u64,
    pub default_matcher: String,
    pub registry_size: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if state.jobs.executor().is_shutdown() {
            "stopping"
        } else {
            "operational"
        },
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_connections: state.connections.active_count(),
        accepted_connections: state.connections.accepted_count(),
        default_matcher: state.jobs.default_matcher_name(),
        registry_size: state.jobs.registry().len(),
    })
}

pub async fn get_jobs(State(state): State<AdminState>) -> Json<Vec<QueuedJob>> {
    Json(state.jobs.registry().snapshot())
}

pub async fn get_job(State(state): State<AdminState>, Path(id): Path<String>) -> Result<Json<JobStatus>, StatusCode> {
    let id: JobId = id.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let state = state.jobs.state(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(JobStatus { id, state }))
}

pub async fn get_executor(State(state): State<AdminState>) -> Json<ExecutorStats> {
    Json(state.jobs.executor().stats())
}
