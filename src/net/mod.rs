//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Context config (host, port, path)
//!     → acceptor.rs (bind, bounded-wait accept loop)
//!     → connection.rs (id, active-count guard)
//!     → executor submit("connection")
//!     → connection.rs serve_connection (hyper HTTP/1.1 + axum router)
//!
//! Acceptor States:
//!     Init → Listening → Stopped
//! ```
//!
//! # Design Decisions
//! - One acceptor per context, each on its own task
//! - Accept errors are logged and skipped; they never stop the loop
//! - Stopping an acceptor lets in-flight requests finish, then closes its connections
//! - A connection that sends no request head within the header timeout is closed

pub mod acceptor;
pub mod connection;

pub use acceptor::{Acceptor, AcceptorError, AcceptorState};
pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker, ServeOptions};
