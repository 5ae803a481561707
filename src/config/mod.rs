//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RuntimeConfig (validated, immutable)
//!     → handed to Runtime at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → reload channel → async job matcher swapped atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the async job matcher is hot-reloadable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AsyncJobsConfig, ContextConfig, ExecutorConfig, ListenerConfig, ObservabilityConfig,
    RuntimeConfig, TimeoutConfig, DEFAULT_PORT,
};
pub use validation::ValidationError;
