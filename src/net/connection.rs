//! Connection lifecycle tracking and serving.
//!
//! # Responsibilities
//! - Number accepted connections for tracing
//! - Count active and accepted connections
//! - Serve HTTP/1.1 on an accepted stream with the application router
//! - Close connections that stay silent or outlive their acceptor
//!
//! # Design Decisions
//! - The guard travels with the unit of work, so the count drops however the unit ends
//! - Peer address is exposed to handlers as `ConnectInfo`
//! - A connection occupies a worker while open, so every connection is bounded:
//!   the header read timeout closes silent and idle ones, and acceptor stop
//!   closes the rest gracefully

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tower::ServiceExt;

use crate::executor::BoxError;

/// Identifier of an accepted connection, unique within its tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counts {
    accepted: AtomicU64,
    active: AtomicU64,
}

/// Counts connections across all contexts sharing it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counts: Arc<Counts>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection. The returned guard keeps it active.
    pub fn track(&self) -> ConnectionGuard {
        let id = ConnectionId(self.counts.accepted.fetch_add(1, Ordering::Relaxed) + 1);
        self.counts.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            counts: Arc::clone(&self.counts),
            id,
        }
    }

    /// Connections currently being served.
    pub fn active_count(&self) -> u64 {
        self.counts.active.load(Ordering::SeqCst)
    }

    /// Connections accepted since the tracker was created.
    pub fn accepted_count(&self) -> u64 {
        self.counts.accepted.load(Ordering::Relaxed)
    }
}

/// Marks one connection as active until dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    counts: Arc<Counts>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counts.active.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Per-connection HTTP/1.1 settings.
#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    pub keep_alive: bool,
    pub header_read_timeout: Duration,
}

/// Serve HTTP/1.1 requests on `stream` until the peer closes it, the request
/// head does not arrive within the header timeout, or `stop` turns true.
///
/// On stop the connection finishes its in-flight request and closes.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    options: ServeOptions,
    mut stop: watch::Receiver<bool>,
    guard: ConnectionGuard,
) -> Result<(), BoxError> {
    let _ = stream.set_nodelay(true);

    let service = app.map_request(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    });

    tracing::debug!(connection_id = %guard.id(), "Serving connection");

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(options.header_read_timeout)
        .keep_alive(options.keep_alive)
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(conn);

    let stopped = async move {
        let _ = stop.wait_for(|stopped| *stopped).await;
    };

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = stopped => {
            tracing::debug!(connection_id = %guard.id(), "Closing connection on shutdown");
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_timeout() => {
            tracing::debug!(connection_id = %guard.id(), "Request head timed out, closing connection");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
