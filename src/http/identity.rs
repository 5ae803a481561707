//! Caller identity resolution.
//!
//! # Responsibilities
//! - Turn request headers into an [`Identity`] for reject-rule matching
//!
//! # Design Decisions
//! - Resolution never fails: anything unrecognized is an absent identity
//! - Pluggable per application through [`IdentityResolver`]

use std::fmt::Debug;

use axum::http::{header, HeaderMap};

use crate::jobs::Identity;

/// Derives the caller identity of an asynchronous request.
pub trait IdentityResolver: Send + Sync + Debug + 'static {
    fn resolve(&self, headers: &HeaderMap) -> Identity;
}

/// Uses the token of `Authorization: Bearer <subject>` as the principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerIdentity;

impl IdentityResolver for BearerIdentity {
    fn resolve(&self, headers: &HeaderMap) -> Identity {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|subject| !subject.is_empty())
            .map(Identity::present)
            .unwrap_or_default()
    }
}

/// Treats every caller as anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl IdentityResolver for AnonymousIdentity {
    fn resolve(&self, _headers: &HeaderMap) -> Identity {
        Identity::Absent
    }
}
