//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the runtime.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jobs::RejectRule;

/// Port used when a context has no port, or a non-positive one.
pub const DEFAULT_PORT: u16 = 8080;

/// Root configuration for the runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Listening contexts; one acceptor each.
    pub contexts: Vec<ContextConfig>,

    /// Accept loop settings shared by all contexts.
    pub listener: ListenerConfig,

    /// Worker pool settings.
    pub executor: ExecutorConfig,

    /// Asynchronous job settings.
    pub async_jobs: AsyncJobsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            contexts: vec![ContextConfig::default()],
            listener: ListenerConfig::default(),
            executor: ExecutorConfig::default(),
            async_jobs: AsyncJobsConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// A listening context: one socket serving the application under a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Context name for logging.
    pub name: String,

    /// Host or IP to bind.
    pub host: String,

    /// Port to bind. Unset or non-positive falls back to [`DEFAULT_PORT`].
    pub port: Option<i64>,

    /// Path prefix the application is mounted under.
    pub path: String,
}

impl ContextConfig {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port: Some(i64::from(port)),
            ..Self::default()
        }
    }

    /// Port to bind, applying the default fallback.
    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) if port > 0 => u16::try_from(port).unwrap_or(DEFAULT_PORT),
            _ => DEFAULT_PORT,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            host: "0.0.0.0".to_string(),
            port: None,
            path: "/".to_string(),
        }
    }
}

/// Accept loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bounded wait of a single accept attempt in milliseconds.
    /// Also bounds how long `stop()` takes to be observed.
    pub accept_poll_ms: u64,

    /// Keep HTTP/1.1 connections open between requests.
    pub keep_alive: bool,

    /// How long a connection may wait for a complete request head, in
    /// milliseconds. Bounds silent and idle keep-alive connections, each of
    /// which occupies a worker.
    pub header_read_timeout_ms: u64,
}

impl ListenerConfig {
    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_millis(self.header_read_timeout_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            accept_poll_ms: 500,
            keep_alive: true,
            header_read_timeout_ms: 30_000,
        }
    }
}

/// Execution service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker tasks.
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { workers: 32 }
    }
}

/// Asynchronous job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AsyncJobsConfig {
    /// Reject rule for async routes that don't declare one.
    pub default_reject_rule: RejectRule,

    /// Named matcher replacing the default rule (e.g. "same-route" or a custom one).
    pub matcher: Option<String>,

    /// Path clients poll for job state; ids are appended as a segment.
    pub feedback_path: String,

    /// How long finished jobs stay visible on the feedback path, in seconds.
    pub outcome_retention_secs: u64,

    /// Maximum accepted request body for async routes, in bytes.
    pub max_content_bytes: usize,
}

impl Default for AsyncJobsConfig {
    fn default() -> Self {
        Self {
            default_reject_rule: RejectRule::SameRequest,
            matcher: None,
            feedback_path: "/async/feedback".to_string(),
            outcome_retention_secs: 300,
            max_content_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin host.
    pub host: String,

    /// Admin port.
    pub port: u16,
}

impl AdminConfig {
    pub fn context(&self) -> ContextConfig {
        ContextConfig {
            name: "admin".to_string(),
            host: self.host.clone(),
            port: Some(i64::from(self.port)),
            path: "/".to_string(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8081,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: RuntimeConfig = toml::from_str("").unwrap();
        assert_eq!(config.contexts.len(), 1);
        assert_eq!(config.contexts[0].effective_port(), DEFAULT_PORT);
        assert_eq!(config.async_jobs.default_reject_rule, RejectRule::SameRequest);
        assert_eq!(config.async_jobs.feedback_path, "/async/feedback");
    }

    #[test]
    fn non_positive_port_falls_back_to_default() {
        let mut context = ContextConfig::default();
        for port in [None, Some(0), Some(-1)] {
            context.port = port;
            assert_eq!(context.effective_port(), DEFAULT_PORT);
        }
        context.port = Some(9000);
        assert_eq!(context.effective_port(), 9000);
    }

    #[test]
    fn parses_full_document() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [[contexts]]
            name = "api"
            port = 9001
            path = "/api"

            [[contexts]]
            name = "internal"
            host = "127.0.0.1"

            [listener]
            accept_poll_ms = 100

            [executor]
            workers = 4

            [async_jobs]
            default_reject_rule = "SAME_CONTENT"
            matcher = "same-route"
            "#,
        )
        .unwrap();

        assert_eq!(config.contexts.len(), 2);
        assert_eq!(config.contexts[0].path, "/api");
        assert_eq!(config.contexts[1].effective_port(), DEFAULT_PORT);
        assert_eq!(config.listener.accept_poll_ms, 100);
        assert!(config.listener.keep_alive);
        assert_eq!(config.listener.header_read_timeout(), Duration::from_secs(30));
        assert_eq!(config.executor.workers, 4);
        assert_eq!(config.async_jobs.default_reject_rule, RejectRule::SameContent);
        assert_eq!(config.async_jobs.matcher.as_deref(), Some("same-route"));
    }
}
