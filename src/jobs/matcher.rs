//! Request matching for deduplication.
//!
//! # Responsibilities
//! - Decide whether a new request coalesces with an already-queued one
//! - Provide the built-in rule-based policy and a route-only matcher
//! - Look matchers up by name for configuration
//!
//! # Design Decisions
//! - Matchers are pure: they read the queued slice and never mutate it
//! - Route equality is a precondition for every rule
//! - First match in insertion order wins, so tie-breaks are deterministic

use std::collections::HashMap;
use std::sync::Arc;

use crate::jobs::request::{AsyncRequest, JobId};
use crate::jobs::rule::RejectRule;

/// Trait for deciding whether a request duplicates a queued one.
pub trait RequestMatcher: Send + Sync + std::fmt::Debug {
    /// Returns the id of the queued request `request` coalesces with, if any.
    fn find_match(&self, request: &AsyncRequest, queued: &[AsyncRequest]) -> Option<JobId>;
}

/// Reject-rule based matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectPolicy {
    rule: RejectRule,
}

impl RejectPolicy {
    pub fn new(rule: RejectRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> RejectRule {
        self.rule
    }

    fn accepts(&self, queued: &AsyncRequest, request: &AsyncRequest) -> bool {
        match self.rule {
            RejectRule::Never => false,
            RejectRule::SameContent => queued.route.same_content(&request.route),
            RejectRule::SameIdentity => queued.identity.subsumes(&request.identity),
            RejectRule::SameRequest => {
                queued.route.same_content(&request.route) && queued.identity.subsumes(&request.identity)
            }
        }
    }
}

impl RequestMatcher for RejectPolicy {
    fn find_match(&self, request: &AsyncRequest, queued: &[AsyncRequest]) -> Option<JobId> {
        if self.rule == RejectRule::Never {
            return None;
        }

        queued
            .iter()
            .filter(|candidate| candidate.route.same_target(&request.route))
            .find(|candidate| self.accepts(candidate, request))
            .map(|candidate| candidate.id)
    }
}

/// Coalesces on route equality alone, ignoring content and identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameRouteMatcher;

impl RequestMatcher for SameRouteMatcher {
    fn find_match(&self, request: &AsyncRequest, queued: &[AsyncRequest]) -> Option<JobId> {
        queued
            .iter()
            .find(|candidate| candidate.route.same_target(&request.route))
            .map(|candidate| candidate.id)
    }
}

/// Name of the route-only matcher.
pub const SAME_ROUTE: &str = "same-route";

/// Named matchers selectable from configuration.
#[derive(Debug, Clone)]
pub struct MatcherRegistry {
    matchers: HashMap<String, Arc<dyn RequestMatcher>>,
}

impl MatcherRegistry {
    /// Registry holding one matcher per reject rule plus `same-route`.
    pub fn with_builtins() -> Self {
        let mut matchers: HashMap<String, Arc<dyn RequestMatcher>> = HashMap::new();
        for rule in RejectRule::ALL {
            matchers.insert(rule.matcher_name().to_string(), Arc::new(RejectPolicy::new(rule)));
        }
        matchers.insert(SAME_ROUTE.to_string(), Arc::new(SameRouteMatcher));
        Self { matchers }
    }

    /// Register (or replace) a matcher under `name`.
    pub fn register(&mut self, name: impl Into<String>, matcher: Arc<dyn RequestMatcher>) {
        self.matchers.insert(name.into(), matcher);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RequestMatcher>> {
        self.matchers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.matchers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.matchers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::request::{Content, Identity, Route, RouteTarget};
    use serde_json::json;

    fn target() -> RouteTarget {
        RouteTarget::new("/reports/{id}", "report").with_param("id", "7")
    }

    fn request(content: Option<serde_json::Value>, identity: Identity) -> AsyncRequest {
        let mut route = Route::new(target());
        if let Some(value) = content {
            route = route.with_content(Content::Json(value));
        }
        AsyncRequest::new(route, identity)
    }

    fn policy(rule: RejectRule) -> RejectPolicy {
        RejectPolicy::new(rule)
    }

    #[test]
    fn never_returns_none() {
        let queued = vec![
            request(None, Identity::Absent),
            request(Some(json!(1)), Identity::present("a")),
        ];
        let incoming = request(None, Identity::Absent);
        assert_eq!(policy(RejectRule::Never).find_match(&incoming, &queued), None);
    }

    #[test]
    fn empty_queue_never_matches() {
        let incoming = request(None, Identity::Absent);
        for rule in RejectRule::ALL {
            assert_eq!(policy(rule).find_match(&incoming, &[]), None);
        }
    }

    #[test]
    fn same_content_matches_equal_content() {
        let queued = vec![request(Some(json!({"year": 2024})), Identity::present("a"))];

        let equal = request(Some(json!({"year": 2024})), Identity::present("b"));
        assert_eq!(policy(RejectRule::SameContent).find_match(&equal, &queued), Some(queued[0].id));

        let different = request(Some(json!({"year": 2025})), Identity::present("a"));
        assert_eq!(policy(RejectRule::SameContent).find_match(&different, &queued), None);
    }

    #[test]
    fn same_content_matches_when_both_contents_are_absent() {
        let queued = vec![request(None, Identity::Absent)];
        let incoming = request(None, Identity::present("a"));
        assert_eq!(policy(RejectRule::SameContent).find_match(&incoming, &queued), Some(queued[0].id));
    }

    #[test]
    fn same_content_never_matches_absent_against_present() {
        let queued = vec![request(None, Identity::Absent)];
        let incoming = request(Some(json!(null)), Identity::Absent);
        assert_eq!(policy(RejectRule::SameContent).find_match(&incoming, &queued), None);

        let queued = vec![request(Some(json!(null)), Identity::Absent)];
        let incoming = request(None, Identity::Absent);
        assert_eq!(policy(RejectRule::SameContent).find_match(&incoming, &queued), None);
    }

    #[test]
    fn same_identity_treats_absent_queued_identity_as_wildcard() {
        let queued = vec![request(None, Identity::Absent)];
        let incoming = request(Some(json!("other")), Identity::present("anyone"));
        assert_eq!(policy(RejectRule::SameIdentity).find_match(&incoming, &queued), Some(queued[0].id));
    }

    #[test]
    fn same_identity_requires_equal_present_identity() {
        let queued = vec![request(None, Identity::present("alice"))];

        let bob = request(None, Identity::present("bob"));
        assert_eq!(policy(RejectRule::SameIdentity).find_match(&bob, &queued), None);

        let alice = request(None, Identity::present("alice"));
        assert_eq!(policy(RejectRule::SameIdentity).find_match(&alice, &queued), Some(queued[0].id));

        let anonymous = request(None, Identity::Absent);
        assert_eq!(policy(RejectRule::SameIdentity).find_match(&anonymous, &queued), None);
    }

    #[test]
    fn same_request_requires_content_and_identity() {
        let queued = vec![request(Some(json!({"q": 1})), Identity::present("alice"))];
        let rule = policy(RejectRule::SameRequest);

        let both = request(Some(json!({"q": 1})), Identity::present("alice"));
        assert_eq!(rule.find_match(&both, &queued), Some(queued[0].id));

        let content_only = request(Some(json!({"q": 1})), Identity::present("bob"));
        assert_eq!(rule.find_match(&content_only, &queued), None);

        let identity_only = request(Some(json!({"q": 2})), Identity::present("alice"));
        assert_eq!(rule.find_match(&identity_only, &queued), None);
    }

    #[test]
    fn different_routes_never_match() {
        let queued = vec![request(None, Identity::Absent)];
        let other = AsyncRequest::new(
            Route::new(RouteTarget::new("/reports/{id}", "report").with_param("id", "8")),
            Identity::Absent,
        );

        for rule in RejectRule::ALL {
            assert_eq!(policy(rule).find_match(&other, &queued), None, "rule {rule}");
        }
        assert_eq!(SameRouteMatcher.find_match(&other, &queued), None);
    }

    #[test]
    fn first_match_wins_in_insertion_order() {
        let first = request(Some(json!("x")), Identity::Absent);
        let second = request(Some(json!("y")), Identity::Absent);
        let third = request(Some(json!("x")), Identity::Absent);
        let queued = vec![first.clone(), second, third];

        let incoming = request(Some(json!("x")), Identity::present("z"));
        assert_eq!(policy(RejectRule::SameContent).find_match(&incoming, &queued), Some(first.id));
        assert_eq!(policy(RejectRule::SameRequest).find_match(&incoming, &queued), Some(first.id));
    }

    #[test]
    fn matching_does_not_mutate_the_queue() {
        let queued = vec![request(None, Identity::Absent), request(None, Identity::Absent)];
        let ids: Vec<_> = queued.iter().map(|r| r.id).collect();
        let incoming = request(None, Identity::Absent);

        let _ = policy(RejectRule::SameRequest).find_match(&incoming, &queued);
        assert_eq!(queued.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn same_route_matcher_ignores_content_and_identity() {
        let queued = vec![request(Some(json!(1)), Identity::present("alice"))];
        let incoming = request(Some(json!(2)), Identity::present("bob"));
        assert_eq!(SameRouteMatcher.find_match(&incoming, &queued), Some(queued[0].id));
    }

    #[test]
    fn registry_holds_builtins_and_custom_matchers() {
        let mut registry = MatcherRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["never", "same-content", "same-identity", "same-request", "same-route"]
        );

        registry.register("custom", Arc::new(SameRouteMatcher));
        assert!(registry.contains("custom"));
        assert!(registry.get("missing").is_none());
    }
}
