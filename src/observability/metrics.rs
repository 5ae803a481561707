//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_connections_accepted_total` (counter): accepted connections by context
//! - `dispatch_accept_errors_total` (counter): failed accepts by context
//! - `dispatch_work_completed_total` / `dispatch_work_failed_total` (counter): by category
//! - `dispatch_work_rejected_total` (counter): work submitted after shutdown, by category
//! - `dispatch_jobs_registered_total` / `dispatch_jobs_coalesced_total` (counter): by handler
//! - `dispatch_jobs_finished_total` (counter): by terminal state
//! - `dispatch_registry_size` (gauge): in-flight async jobs
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter is optional and served on its own address

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::jobs::JobState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted(context: &str) {
    metrics::counter!("dispatch_connections_accepted_total", "context" => context.to_string()).increment(1);
}

pub fn record_accept_error(context: &str) {
    metrics::counter!("dispatch_accept_errors_total", "context" => context.to_string()).increment(1);
}

pub fn record_work_finished(category: &'static str, ok: bool) {
    if ok {
        metrics::counter!("dispatch_work_completed_total", "category" => category).increment(1);
    } else {
        metrics::counter!("dispatch_work_failed_total", "category" => category).increment(1);
    }
}

pub fn record_work_rejected(category: &'static str) {
    metrics::counter!("dispatch_work_rejected_total", "category" => category).increment(1);
}

pub fn record_job_registered(handler: &str) {
    metrics::counter!("dispatch_jobs_registered_total", "handler" => handler.to_string()).increment(1);
}

pub fn record_job_coalesced(handler: &str) {
    metrics::counter!("dispatch_jobs_coalesced_total", "handler" => handler.to_string()).increment(1);
}

pub fn record_job_finished(state: JobState) {
    metrics::counter!("dispatch_jobs_finished_total", "state" => state.as_str()).increment(1);
}

pub fn record_registry_size(size: usize) {
    metrics::gauge!("dispatch_registry_size").set(size as f64);
}
