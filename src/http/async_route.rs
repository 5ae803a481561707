//! Asynchronous route endpoint.
//!
//! # Responsibilities
//! - Build an [`AsyncRequest`] from the matched route, parameters, body and caller
//! - Hand it to [`AsyncJobs`] and answer immediately with `202 Accepted`
//! - Point the client at the feedback resource of the job it was given
//!
//! # Design Decisions
//! - The resource is the matched path template, not the concrete URI
//! - Path parameters win over query parameters of the same name
//! - A coalesced request gets the id of the in-flight job, never a new one

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{MatchedPath, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::executor::BoxError;
use crate::http::identity::IdentityResolver;
use crate::jobs::{
    AsyncHandler, AsyncJobs, AsyncRequest, Content, JobId, RegisterOutcome, RejectRule, Route, RouteTarget,
};

/// An asynchronous handler declared on the application.
#[derive(Clone)]
pub struct AsyncRoute {
    name: String,
    handler: Arc<dyn AsyncHandler>,
    rule: Option<RejectRule>,
}

impl AsyncRoute {
    /// Declare `handler` under `name`. Requests are coalesced by the
    /// configured default matcher unless [`reject`](Self::reject) is used.
    pub fn new<H: AsyncHandler>(name: impl Into<String>, handler: H) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            rule: None,
        }
    }

    /// Use `rule` for this route instead of the default matcher.
    pub fn reject(mut self, rule: RejectRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self) -> Option<RejectRule> {
        self.rule
    }
}

impl fmt::Debug for AsyncRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRoute")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

/// Per-route state of the endpoint.
#[derive(Debug, Clone)]
pub(crate) struct AsyncEndpoint {
    pub(crate) jobs: Arc<AsyncJobs>,
    pub(crate) route: AsyncRoute,
    pub(crate) identity: Arc<dyn IdentityResolver>,
    /// Feedback path including the context prefix.
    pub(crate) feedback_base: Arc<str>,
}

/// Body of the `202 Accepted` answer.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub id: JobId,
    pub state: &'static str,
    pub feedback: String,
}

pub(crate) async fn accept_async(
    State(endpoint): State<AsyncEndpoint>,
    matched: MatchedPath,
    Path(path_params): Path<HashMap<String, String>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut params: BTreeMap<String, String> = query.into_iter().collect();
    params.extend(path_params);

    let target = RouteTarget {
        resource: matched.as_str().to_string(),
        handler: endpoint.route.name.clone(),
        params,
    };
    let route = Route {
        target,
        content: content_of(&headers, body),
    };
    let identity = endpoint.identity.resolve(&headers);
    let request = AsyncRequest::new(route, identity);

    let outcome = endpoint
        .jobs
        .dispatch(request, endpoint.route.rule, Arc::clone(&endpoint.route.handler));

    let state = match outcome {
        RegisterOutcome::New(_) => "QUEUED",
        RegisterOutcome::Coalesced(_) => "COALESCED",
    };
    let feedback = format!("{}/{}", endpoint.feedback_base, outcome.id());

    (
        StatusCode::ACCEPTED,
        [(header::LOCATION, feedback.clone())],
        Json(Accepted {
            id: outcome.id(),
            state,
            feedback,
        }),
    )
        .into_response()
}

/// Request body as route content.
///
/// JSON bodies that parse are compared structurally; any other non-empty
/// body is compared byte for byte.
fn content_of(headers: &HeaderMap, body: Bytes) -> Option<Content> {
    if body.is_empty() {
        return None;
    }
    if is_json(headers) {
        if let Ok(value) = serde_json::from_slice(&body) {
            return Some(Content::Json(value));
        }
        tracing::debug!(bytes = body.len(), "JSON body did not parse, keeping raw content");
    }
    Some(Content::Raw(body))
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.eq_ignore_ascii_case("application/json") || mime.to_ascii_lowercase().ends_with("+json")
}

/// Convenience for handlers that only need a closure over the request.
pub fn handler_fn<F>(f: F) -> impl AsyncHandler
where
    F: Fn(AsyncRequest) -> Result<(), BoxError> + Send + Sync + 'static,
{
    move |request: AsyncRequest| std::future::ready(f(request))
}
