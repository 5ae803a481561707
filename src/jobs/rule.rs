//! Reject rules: which queued requests a new request coalesces with.

use serde::{Deserialize, Serialize};

/// Reject rule applied to route-equal queued requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectRule {
    /// Never coalesce; every request runs.
    Never,
    /// Coalesce when the content is equal.
    SameContent,
    /// Coalesce when the queued identity subsumes the incoming one.
    SameIdentity,
    /// Coalesce when both content and identity match.
    #[default]
    SameRequest,
}

impl RejectRule {
    pub const ALL: [RejectRule; 4] = [
        RejectRule::Never,
        RejectRule::SameContent,
        RejectRule::SameIdentity,
        RejectRule::SameRequest,
    ];

    /// Matcher name this rule is registered under.
    pub fn matcher_name(&self) -> &'static str {
        match self {
            RejectRule::Never => "never",
            RejectRule::SameContent => "same-content",
            RejectRule::SameIdentity => "same-identity",
            RejectRule::SameRequest => "same-request",
        }
    }
}

impl std::fmt::Display for RejectRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.matcher_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        rule: RejectRule,
    }

    #[test]
    fn parses_screaming_snake_case() {
        let holder: Holder = toml::from_str(r#"rule = "SAME_IDENTITY""#).unwrap();
        assert_eq!(holder.rule, RejectRule::SameIdentity);
    }

    #[test]
    fn unknown_rule_is_rejected() {
        assert!(toml::from_str::<Holder>(r#"rule = "SAME_ROUTE""#).is_err());
    }
}
