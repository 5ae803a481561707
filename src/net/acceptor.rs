//! Connection acceptor for one listening context.
//!
//! # Responsibilities
//! - Bind the context's port (with default-port fallback)
//! - Accept connections with a bounded wait and hand them to the execution service
//! - Survive individual accept errors
//! - Stop within one poll interval and release the socket
//!
//! # Design Decisions
//! - Two-phase lifecycle: `new()` does no I/O, `start()` binds and spawns the loop
//! - `stop()` is idempotent; the loop observes it on its next iteration
//! - Accept timeouts are the normal idle case, not errors
//! - Connections watch the same stop flag and close gracefully once it is set

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ContextConfig, ListenerConfig};
use crate::executor::{ExecutionService, CONNECTION};
use crate::net::connection::{serve_connection, ConnectionTracker, ServeOptions};
use crate::observability::metrics;
use crate::observability::tracing::connection_span;

/// Error type for acceptor operations.
#[derive(Debug, Error)]
pub enum AcceptorError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("acceptor `{0}` was already started")]
    AlreadyStarted(String),
}

/// Lifecycle of an [`Acceptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    /// Constructed, not bound.
    Init,
    /// Bound and accepting.
    Listening,
    /// Socket released. Terminal.
    Stopped,
}

/// Owns one listening socket and feeds accepted connections to the executor.
#[derive(Debug)]
pub struct Acceptor {
    context: ContextConfig,
    poll_interval: Duration,
    serve: ServeOptions,
    app: Router,
    executor: Arc<ExecutionService>,
    tracker: ConnectionTracker,
    state: Arc<watch::Sender<AcceptorState>>,
    stop_tx: watch::Sender<bool>,
    local_addr: Mutex<Option<SocketAddr>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Acceptor {
    pub fn new(
        context: ContextConfig,
        listener: &ListenerConfig,
        app: Router,
        executor: Arc<ExecutionService>,
        tracker: ConnectionTracker,
    ) -> Self {
        let (state, _) = watch::channel(AcceptorState::Init);
        let (stop_tx, _) = watch::channel(false);
        Self {
            context,
            poll_interval: Duration::from_millis(listener.accept_poll_ms.max(1)),
            serve: ServeOptions {
                keep_alive: listener.keep_alive,
                header_read_timeout: listener.header_read_timeout(),
            },
            app,
            executor,
            tracker,
            state: Arc::new(state),
            stop_tx,
            local_addr: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Bind the socket and start accepting.
    pub async fn start(&self) -> Result<SocketAddr, AcceptorError> {
        if *self.state.borrow() != AcceptorState::Init {
            return Err(AcceptorError::AlreadyStarted(self.context.name.clone()));
        }

        let port = self.context.effective_port();
        let address = format!("{}:{}", self.context.host, port);
        let bind_err = |source| AcceptorError::Bind {
            address: address.clone(),
            source,
        };

        let listener = TcpListener::bind((self.context.host.as_str(), port))
            .await
            .map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        // A stop() that raced the bind wins.
        if *self.stop_tx.borrow() {
            self.state.send_replace(AcceptorState::Stopped);
            return Ok(local_addr);
        }

        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);
        self.state.send_replace(AcceptorState::Listening);

        tracing::info!(
            context = %self.context.name,
            address = %local_addr,
            path = %self.context.path,
            "Listening for connections"
        );

        let accept_loop = AcceptLoop {
            context: self.context.name.clone(),
            listener,
            poll_interval: self.poll_interval,
            serve: self.serve,
            app: self.app.clone(),
            executor: Arc::clone(&self.executor),
            tracker: self.tracker.clone(),
            stop_rx: self.stop_tx.subscribe(),
            state: Arc::clone(&self.state),
        };
        let handle = tokio::spawn(accept_loop.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(local_addr)
    }

    /// Ask the loop to stop. Idempotent.
    pub fn stop(&self) {
        let already = self.stop_tx.send_replace(true);
        if !already {
            tracing::info!(context = %self.context.name, "Stopping acceptor");
        }
        if *self.state.borrow() == AcceptorState::Init {
            self.state.send_replace(AcceptorState::Stopped);
        }
    }

    /// Wait until the loop has exited and the socket is released.
    pub async fn wait_stopped(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == AcceptorState::Stopped).await;

        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(context = %self.context.name, error = %e, "Accept loop ended abnormally");
            }
        }
    }

    pub fn state(&self) -> AcceptorState {
        *self.state.borrow()
    }

    /// Bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> &ContextConfig {
        &self.context
    }
}

/// State moved into the spawned accept loop.
struct AcceptLoop {
    context: String,
    listener: TcpListener,
    poll_interval: Duration,
    serve: ServeOptions,
    app: Router,
    executor: Arc<ExecutionService>,
    tracker: ConnectionTracker,
    stop_rx: watch::Receiver<bool>,
    state: Arc<watch::Sender<AcceptorState>>,
}

impl AcceptLoop {
    async fn run(mut self) {
        loop {
            if *self.stop_rx.borrow_and_update() {
                break;
            }

            let accepted = tokio::select! {
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                accepted = tokio::time::timeout(self.poll_interval, self.listener.accept()) => accepted,
            };

            match accepted {
                Err(_elapsed) => continue,
                Ok(Ok((stream, peer))) => self.hand_off(stream, peer),
                Ok(Err(e)) => {
                    metrics::record_accept_error(&self.context);
                    tracing::warn!(context = %self.context, error = %e, "Failed to accept connection");
                }
            }
        }

        let AcceptLoop { context, listener, state, .. } = self;
        drop(listener);
        state.send_replace(AcceptorState::Stopped);
        tracing::info!(context = %context, "Acceptor stopped");
    }

    fn hand_off(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let guard = self.tracker.track();
        let span = connection_span(&self.context, guard.id(), peer);
        metrics::record_connection_accepted(&self.context);
        tracing::debug!(
            context = %self.context,
            peer_addr = %peer,
            connection_id = %guard.id(),
            "Connection accepted"
        );

        let stop = self.stop_rx.clone();
        let unit =
            serve_connection(stream, peer, self.app.clone(), self.serve, stop, guard).instrument(span);
        self.executor.submit(unit, CONNECTION);
    }
}
