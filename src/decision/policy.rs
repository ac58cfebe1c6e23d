//! Tiered auto-response policy.
//!
//! Requests are matched against three tiers. Safe requests are answered
//! outright, contextual ones only when their conditions hold, and
//! review-required ones are always escalated whatever the mode.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Policy tier of a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Safe,
    Contextual,
    Review,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Contextual => "contextual",
            Self::Review => "review",
        }
    }

    /// Review-tier requests always escalate.
    #[must_use]
    pub fn always_escalates(&self) -> bool {
        matches!(self, Self::Review)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compiled policy rule.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub name: &'static str,
    pub tier: Tier,
    pub confidence: f64,
    pub conditions: &'static [&'static str],
    pub response: &'static str,
    pub matcher: Regex,
}

struct RuleSpec {
    name: &'static str,
    tier: Tier,
    confidence: f64,
    conditions: &'static [&'static str],
    response: &'static str,
    pattern: &'static str,
}

/// Rule table, checked in order. Review rules come first so a request that
/// mentions a deletion is never answered by a broader safe rule.
const RULES: &[RuleSpec] = &[
    // Review required
    RuleSpec {
        name: "deletion",
        tier: Tier::Review,
        confidence: 0.3,
        conditions: &["always_review_deletions"],
        response: "Please wait: deletions need to be reviewed before you continue.",
        pattern: r"(?i)\b(delete|deleting|remove|removing|rm -rf|erase|wipe|overwrite)\b",
    },
    RuleSpec {
        name: "schema_change",
        tier: Tier::Review,
        confidence: 0.35,
        conditions: &["always_review_schema_changes"],
        response: "Please wait: schema changes need to be reviewed before you continue.",
        pattern: r"(?i)\b(schema|migration|migrate|alter table|drop table)\b",
    },
    RuleSpec {
        name: "database_change",
        tier: Tier::Review,
        confidence: 0.35,
        conditions: &["always_review_database_changes"],
        response: "Please wait: database changes need to be reviewed before you continue.",
        pattern: r"(?i)\b(database|db|sql|table)\b.*\b(change|modify|update|truncate|reset|seed)\b",
    },
    RuleSpec {
        name: "external_integration",
        tier: Tier::Review,
        confidence: 0.4,
        conditions: &[],
        response: "Please wait: external integrations need to be reviewed before you continue.",
        pattern: r"(?i)\b(api key|credentials?|secrets?|webhook|oauth|third-party|external (api|service))\b",
    },
    // Safe
    RuleSpec {
        name: "test_creation",
        tier: Tier::Safe,
        confidence: 0.9,
        conditions: &[],
        response: "Yes, please add the tests.",
        pattern: r"(?i)\b(write|add|create|generate|update)\b.*\b(tests?|specs?)\b",
    },
    RuleSpec {
        name: "documentation",
        tier: Tier::Safe,
        confidence: 0.88,
        conditions: &[],
        response: "Yes, please add the documentation.",
        pattern: r"(?i)\b(comments?|docs?|documentation|readme|docstrings?|jsdoc)\b",
    },
    RuleSpec {
        name: "formatting",
        tier: Tier::Safe,
        confidence: 0.85,
        conditions: &[],
        response: "Yes, please format the code.",
        pattern: r"(?i)\b(format|formatting|prettier|rustfmt|indentation|whitespace)\b",
    },
    // Contextual
    RuleSpec {
        name: "component_creation",
        tier: Tier::Contextual,
        confidence: 0.8,
        conditions: &["has_component_directory"],
        response: "Yes, create the component alongside the existing ones.",
        pattern: r"(?i)\b(create|add|generate)\b.*\bcomponents?\b",
    },
    RuleSpec {
        name: "dependency_install",
        tier: Tier::Contextual,
        confidence: 0.75,
        conditions: &["dependency_install_safe"],
        response: "Yes, install the dependency.",
        pattern: r"(?i)\b(install|add)\b.*\b(dependenc(y|ies)|packages?|npm|pip|cargo|yarn|pnpm)\b",
    },
    RuleSpec {
        name: "config_change",
        tier: Tier::Contextual,
        confidence: 0.75,
        conditions: &["config_change_safe"],
        response: "Yes, update the configuration.",
        pattern: r"(?i)\b(config|configuration|settings|tsconfig|package\.json)\b",
    },
    RuleSpec {
        name: "file_creation",
        tier: Tier::Contextual,
        confidence: 0.7,
        conditions: &["has_requirements"],
        response: "Yes, create the files needed for the requirements.",
        pattern: r"(?i)\b(create|write|add|generate)\b.*\b(files?|director(y|ies)|folders?)\b",
    },
];

/// The compiled policy table.
#[derive(Debug)]
pub struct PolicyCatalog {
    rules: Vec<PolicyRule>,
}

impl PolicyCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|def| match Regex::new(def.pattern) {
                Ok(matcher) => Some(PolicyRule {
                    name: def.name,
                    tier: def.tier,
                    confidence: def.confidence,
                    conditions: def.conditions,
                    response: def.response,
                    matcher,
                }),
                Err(e) => {
                    warn!("Skipping invalid policy rule '{}': {}", def.name, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// First rule matching the text.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.matcher.is_match(text))
    }
}

/// Process-wide policy table, compiled on first use.
pub fn policy() -> &'static PolicyCatalog {
    static POLICY: OnceLock<PolicyCatalog> = OnceLock::new();
    POLICY.get_or_init(PolicyCatalog::builtin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_rule_compiles() {
        assert_eq!(policy().rules().len(), RULES.len());
    }

    #[test]
    fn test_tier_confidence_bands() {
        for rule in policy().rules() {
            match rule.tier {
                Tier::Safe => assert!(rule.confidence >= 0.85, "{}", rule.name),
                Tier::Contextual => {
                    assert!((0.7..=0.8).contains(&rule.confidence), "{}", rule.name)
                }
                Tier::Review => assert!(rule.confidence <= 0.4, "{}", rule.name),
            }
        }
    }

    #[test]
    fn test_review_wins_over_safe() {
        let rule = policy().find("Should I delete the old tests?").unwrap();
        assert_eq!(rule.name, "deletion");
        assert!(rule.tier.always_escalates());
    }

    #[test]
    fn test_find_by_tier() {
        let cases = [
            ("Should I write unit tests for the parser?", "test_creation"),
            ("May I add comments to the module?", "documentation"),
            ("Can I run prettier formatting?", "formatting"),
            ("May I create the following files: a, b, c?", "file_creation"),
            ("Should I add a Button component?", "component_creation"),
            ("May I install the axios package?", "dependency_install"),
            ("Can I change the database table to update the index?", "database_change"),
            ("Should I create a migration for users?", "schema_change"),
            ("Where do I put the Stripe API key?", "external_integration"),
        ];
        for (text, expected) in cases {
            let rule = policy().find(text).unwrap_or_else(|| panic!("no rule for {text}"));
            assert_eq!(rule.name, expected, "{text}");
        }
        assert!(policy().find("Should I proceed?").is_none());
    }
}
