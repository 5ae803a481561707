//! Application assembly.
//!
//! # Responsibilities
//! - Collect ordinary and asynchronous route declarations
//! - Build one axum `Router` per listening context, mounted under its path
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//!
//! # Design Decisions
//! - Declarations are made before the runtime exists; `build()` runs at start
//! - The feedback route is mounted next to the application routes of every context
//! - The body limit only applies to asynchronous routes

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ContextConfig, RuntimeConfig};
use crate::http::async_route::{accept_async, AsyncEndpoint, AsyncRoute};
use crate::http::feedback::job_feedback;
use crate::http::identity::{BearerIdentity, IdentityResolver};
use crate::jobs::{AsyncJobs, MatcherRegistry, RequestMatcher};

/// Declares the routes served on every listening context.
#[derive(Debug, Clone)]
pub struct AppBuilder {
    routes: Router,
    async_routes: Vec<(String, AsyncRoute)>,
    identity: Arc<dyn IdentityResolver>,
    matchers: MatcherRegistry,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            routes: Router::new(),
            async_routes: Vec::new(),
            identity: Arc::new(BearerIdentity),
            matchers: MatcherRegistry::with_builtins(),
        }
    }

    /// Add an ordinary handler answered on the connection.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.routes = self.routes.route(path, method_router);
        self
    }

    /// Add an asynchronous handler, reachable with `POST path`.
    pub fn async_route(mut self, path: &str, route: AsyncRoute) -> Self {
        self.async_routes.push((path.to_string(), route));
        self
    }

    /// Replace the caller identity resolver (default: bearer token subject).
    pub fn identity<R: IdentityResolver>(mut self, resolver: R) -> Self {
        self.identity = Arc::new(resolver);
        self
    }

    /// Register a named matcher selectable with `async_jobs.matcher`.
    pub fn matcher(mut self, name: impl Into<String>, matcher: Arc<dyn RequestMatcher>) -> Self {
        self.matchers.register(name, matcher);
        self
    }

    pub fn matchers(&self) -> &MatcherRegistry {
        &self.matchers
    }

    /// Build the router served on `context`.
    #[allow(deprecated)]
    pub fn build(&self, jobs: Arc<AsyncJobs>, config: &RuntimeConfig, context: &ContextConfig) -> Router {
        let prefix = context.path.trim_end_matches('/');
        let feedback_path = config.async_jobs.feedback_path.as_str();
        let feedback_base: Arc<str> = Arc::from(format!("{prefix}{feedback_path}"));

        let mut async_routes = Router::new();
        for (path, route) in &self.async_routes {
            let endpoint = AsyncEndpoint {
                jobs: Arc::clone(&jobs),
                route: route.clone(),
                identity: Arc::clone(&self.identity),
                feedback_base: Arc::clone(&feedback_base),
            };
            async_routes = async_routes.route(path, post(accept_async).with_state(endpoint));
        }
        let async_routes = async_routes
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.async_jobs.max_content_bytes));

        let app = self
            .routes
            .clone()
            .merge(async_routes)
            .route(&format!("{feedback_path}/{{id}}"), get(job_feedback).with_state(jobs));

        let app = if prefix.is_empty() {
            app
        } else {
            Router::new().nest(prefix, app)
        };

        tracing::debug!(
            context = %context.name,
            prefix = %context.path,
            async_routes = self.async_routes.len(),
            "Application router built"
        );

        app.layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
