//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (runtime.rs):
//!     Config → Runtime::new (no I/O) → start(): executor, then one acceptor per context
//!
//! Shutdown (shutdown.rs, runtime.rs):
//!     Signal received → stop acceptors → wait for sockets → drain executor → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: executor first, listeners last (traffic only when ready)
//! - Ordered shutdown: stop accept, then drain queued work

pub mod runtime;
pub mod shutdown;
pub mod signals;

pub use runtime::{Runtime, RuntimeError};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
