//! Asynchronous request data model.
//!
//! # Responsibilities
//! - Identify jobs with a unique correlation id
//! - Describe what a request targets (route) and carries (content)
//! - Describe who submitted it (identity)
//!
//! # Design Decisions
//! - Route equality covers resource, handler and parameters only; content is compared separately
//! - Content equality is null-safe (`Option<Content>` equality)
//! - Identity is a sum type; an absent identity subsumes every other identity

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifier of an asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What a request resolves to: resource, handler and parameters.
///
/// Two targets are equal iff all three are equal. Parameters are kept in a
/// `BTreeMap` so equality does not depend on the order they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteTarget {
    /// Matched path template, e.g. `/reports/{id}`.
    pub resource: String,
    /// Declared name of the handler.
    pub handler: String,
    /// Path and query parameters.
    pub params: BTreeMap<String, String>,
}

impl RouteTarget {
    pub fn new(resource: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            handler: handler.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Payload carried by a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Content {
    /// A JSON document, compared structurally (object key order is irrelevant).
    Json(serde_json::Value),
    /// Any other non-empty body, compared byte for byte.
    Raw(#[serde(serialize_with = "serialize_raw")] Bytes),
}

fn serialize_raw<S: serde::Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(bytes.len() as u64)
}

/// A route together with its optional content.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub target: RouteTarget,
    pub content: Option<Content>,
}

impl Route {
    pub fn new(target: RouteTarget) -> Self {
        Self { target, content: None }
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    /// Route equality: same resource, handler and parameters.
    pub fn same_target(&self, other: &Route) -> bool {
        self.target == other.target
    }

    /// Null-safe content equality.
    pub fn same_content(&self, other: &Route) -> bool {
        self.content == other.content
    }
}

/// Authenticated principal of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into() }
    }
}

/// Caller identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "principal", rename_all = "lowercase")]
pub enum Identity {
    #[default]
    Absent,
    Present(Principal),
}

impl Identity {
    pub fn present(subject: impl Into<String>) -> Self {
        Identity::Present(Principal::new(subject))
    }

    /// Whether a queued request with this identity covers `incoming`.
    ///
    /// An absent identity is a wildcard. A present identity only covers an
    /// equal present identity. Not symmetric: `Present(a)` never covers `Absent`.
    pub fn subsumes(&self, incoming: &Identity) -> bool {
        match (self, incoming) {
            (Identity::Absent, _) => true,
            (Identity::Present(queued), Identity::Present(incoming)) => queued == incoming,
            (Identity::Present(_), Identity::Absent) => false,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Present(principal) => Some(principal),
            Identity::Absent => None,
        }
    }
}

/// A request submitted for asynchronous execution.
#[derive(Debug, Clone, Serialize)]
pub struct AsyncRequest {
    pub id: JobId,
    pub route: Route,
    pub identity: Identity,
    #[serde(serialize_with = "serialize_epoch_millis")]
    pub submitted_at: SystemTime,
}

impl AsyncRequest {
    /// Create a request with a freshly generated id, stamped now.
    pub fn new(route: Route, identity: Identity) -> Self {
        Self {
            id: JobId::new(),
            route,
            identity,
            submitted_at: SystemTime::now(),
        }
    }

    pub fn handler(&self) -> &str {
        &self.route.target.handler
    }
}

fn serialize_epoch_millis<S: serde::Serializer>(at: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    serializer.serialize_u64(u64::try_from(millis).unwrap_or(u64::MAX))
}
