//! Spans correlating log events.
//!
//! Every connection and every async job runs inside its own span, so all events
//! emitted while serving it carry the connection or job id.

use std::net::SocketAddr;

use tracing::Span;

use crate::jobs::JobId;
use crate::net::connection::ConnectionId;

pub fn connection_span(context: &str, id: ConnectionId, peer: SocketAddr) -> Span {
    tracing::info_span!("connection", context = %context, connection_id = %id, peer = %peer)
}

pub fn job_span(id: JobId, handler: &str) -> Span {
    tracing::info_span!("async_job", job_id = %id, handler = %handler)
}
