//! Job feedback endpoint.
//!
//! `GET <feedback_path>/{id}` reports the state of a queued, running or
//! recently finished job.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::jobs::{AsyncJobs, JobId, JobState};

#[derive(Debug, Serialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
}

pub(crate) async fn job_feedback(State(jobs): State<Arc<AsyncJobs>>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<JobId>() else {
        return (StatusCode::BAD_REQUEST, "Malformed job id").into_response();
    };

    match jobs.state(id) {
        Some(state) => Json(JobStatus { id, state }).into_response(),
        None => {
            tracing::debug!(job_id = %id, "Feedback requested for unknown job");
            (StatusCode::NOT_FOUND, "Unknown job").into_response()
        }
    }
}
