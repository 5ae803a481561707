//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers > 0, ports valid, poll and header timeouts > 0)
//! - Detect conflicting contexts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RuntimeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::RuntimeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one context must be configured")]
    NoContexts,
    #[error("duplicate context name `{0}`")]
    DuplicateContext(String),
    #[error("context `{name}` port {port} is out of range")]
    PortOutOfRange { name: String, port: i64 },
    #[error("context `{name}` path `{path}` must start with '/'")]
    InvalidContextPath { name: String, path: String },
    #[error("executor.workers must be greater than zero")]
    NoWorkers,
    #[error("listener.accept_poll_ms must be greater than zero")]
    ZeroPollInterval,
    #[error("listener.header_read_timeout_ms must be greater than zero")]
    ZeroHeaderReadTimeout,
    #[error("async_jobs.feedback_path `{0}` must start with '/' and not end with '/'")]
    InvalidFeedbackPath(String),
    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyAdminKey,
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.contexts.is_empty() {
        errors.push(ValidationError::NoContexts);
    }

    let mut names = HashSet::new();
    for context in &config.contexts {
        if !names.insert(context.name.as_str()) {
            errors.push(ValidationError::DuplicateContext(context.name.clone()));
        }
        if let Some(port) = context.port {
            if port > i64::from(u16::MAX) {
                errors.push(ValidationError::PortOutOfRange {
                    name: context.name.clone(),
                    port,
                });
            }
        }
        if !context.path.starts_with('/') {
            errors.push(ValidationError::InvalidContextPath {
                name: context.name.clone(),
                path: context.path.clone(),
            });
        }
    }

    if config.executor.workers == 0 {
        errors.push(ValidationError::NoWorkers);
    }

    if config.listener.accept_poll_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if config.listener.header_read_timeout_ms == 0 {
        errors.push(ValidationError::ZeroHeaderReadTimeout);
    }

    let feedback = &config.async_jobs.feedback_path;
    if !feedback.starts_with('/') || feedback.len() < 2 || feedback.ends_with('/') {
        errors.push(ValidationError::InvalidFeedbackPath(feedback.clone()));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
