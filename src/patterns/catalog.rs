//! Declarative pattern catalog.
//!
//! The catalog is compiled once per process and shared by reference across
//! every supervision session.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{IssueCategory, Severity};

/// A compiled catalog rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub category: IssueCategory,
    pub severity: Severity,
    pub type_tag: &'static str,
    pub matcher: Regex,
}

/// Rule table: (category, severity, type tag, pattern).
///
/// Ordered from most specific to least specific inside each category.
const RULES: &[(IssueCategory, Severity, &str, &str)] = &[
    // Confusion
    (
        IssueCategory::Confusion,
        Severity::High,
        "clarification_request",
        r"(?i)\b(could you (please )?clarify|can you (please )?clarify|please clarify|need (some )?clarification)\b",
    ),
    (
        IssueCategory::Confusion,
        Severity::High,
        "uncertainty",
        r"(?i)\b(i'?m not sure|i am not sure|i don'?t understand|i do not understand|i'?m confused)\b",
    ),
    (
        IssueCategory::Confusion,
        Severity::High,
        "meaning_request",
        r"(?i)\bwhat (exactly |do )?(do )?you mean\b",
    ),
    (
        IssueCategory::Confusion,
        Severity::Medium,
        "missing_context",
        r"(?i)\b(need more (information|context|details)|missing (information|context|requirements)|no requirements (were )?(provided|found))\b",
    ),
    (
        IssueCategory::Confusion,
        Severity::Medium,
        "ambiguity",
        r"(?i)\b(ambiguous|unclear|not certain|could mean)\b",
    ),
    // Questions
    (
        IssueCategory::Question,
        Severity::High,
        "procedural",
        r"(?i)\b(should i (proceed|continue|go ahead)|shall i (proceed|continue|go ahead)|do you want me to|would you like me to|ready to proceed)\b",
    ),
    (
        IssueCategory::Question,
        Severity::Medium,
        "technical_choice",
        r"(?i)\b(which|what) (framework|library|database|approach|language|stack|tool|option)\b",
    ),
    (
        IssueCategory::Question,
        Severity::Medium,
        "preference",
        r"(?i)\b(target audience|what style|which style|what features|which features|do you prefer|would you prefer|color scheme)\b",
    ),
    (
        IssueCategory::Question,
        Severity::Low,
        "open_question",
        r"\?\s*$",
    ),
    // Permissions
    (
        IssueCategory::Permission,
        Severity::Medium,
        "file_operation",
        r"(?i)\bmay i (create|modify|edit|write|update|delete|remove|overwrite)\b",
    ),
    (
        IssueCategory::Permission,
        Severity::Medium,
        "command_execution",
        r"(?i)\b(may i (run|execute|install)|can i (run|execute|install))\b",
    ),
    (
        IssueCategory::Permission,
        Severity::Medium,
        "explicit_permission",
        r"(?i)\b(do i have permission|need (your )?permission|grant (me )?permission)\b",
    ),
    (
        IssueCategory::Permission,
        Severity::Medium,
        "approval_request",
        r"(?i)\b(allow me to|approve (this|these)|is it ok(ay)? (if|to))\b",
    ),
    (
        IssueCategory::Permission,
        Severity::Medium,
        "yes_no_prompt",
        r"(?i)(\(y/n\)|\[y/n\]|\(yes/no\))",
    ),
    // Errors
    (
        IssueCategory::Error,
        Severity::High,
        "command_not_found",
        r"(?i)\b(command not found|is not recognized as an internal or external command)\b",
    ),
    (
        IssueCategory::Error,
        Severity::High,
        "syntax_error",
        r"(?i)\b(syntaxerror|syntax error|parse error|unexpected token)\b",
    ),
    (
        IssueCategory::Error,
        Severity::Medium,
        "permission_denied",
        r"(?i)\b(permission denied|eacces|eperm|access is denied)\b",
    ),
    (
        IssueCategory::Error,
        Severity::Medium,
        "file_not_found",
        r"(?i)\b(enoent|no such file or directory|cannot find module|module not found)\b",
    ),
    (
        IssueCategory::Error,
        Severity::Medium,
        "timeout",
        r"(?i)\b(timed out|etimedout|timeout exceeded)\b",
    ),
    (
        IssueCategory::Error,
        Severity::Medium,
        "generic_error",
        r"(?i)(\berror:|\bfailed to\b|\bfatal:)",
    ),
    (
        IssueCategory::Error,
        Severity::Low,
        "warning",
        r"(?i)\bwarn(ing)?:",
    ),
    // Progress
    (
        IssueCategory::Progress,
        Severity::Low,
        "completion",
        r"(?i)\b(completed successfully|all tasks (are )?complete|task complete|finished successfully|all done)\b",
    ),
    (
        IssueCategory::Progress,
        Severity::Low,
        "file_creation",
        r"(?i)\b(creating|created|writing|wrote)\s+\S+\.\w+",
    ),
    (
        IssueCategory::Progress,
        Severity::Low,
        "implementation",
        r"(?i)\b(implementing|implemented|adding|building|refactoring)\b",
    ),
    (
        IssueCategory::Progress,
        Severity::Low,
        "testing",
        r"(?i)\b(running tests|tests? pass(ed|ing)?|testing)\b",
    ),
];

/// Exact confusion phrases that earn the high-value confidence bonus.
const HIGH_VALUE_PHRASES: &[&str] = &[
    "could you please clarify",
    "i'm not sure what you mean",
    "i am not sure what you mean",
    "i need more context",
    "what do you mean",
    "i don't understand the requirements",
];

/// The compiled, immutable pattern catalog.
#[derive(Debug)]
pub struct PatternCatalog {
    rules: Vec<PatternRule>,
}

impl PatternCatalog {
    /// Compile the built-in rule table.
    #[must_use]
    pub fn builtin() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|(category, severity, type_tag, pattern)| {
                match Regex::new(pattern) {
                    Ok(matcher) => Some(PatternRule {
                        category: *category,
                        severity: *severity,
                        type_tag,
                        matcher,
                    }),
                    Err(e) => {
                        warn!("Skipping invalid pattern '{}': {}", type_tag, e);
                        None
                    }
                }
            })
            .collect();

        Self { rules }
    }

    /// All rules, in table order.
    #[must_use]
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Check whether the line contains an exact high-value confusion phrase.
    #[must_use]
    pub fn has_high_value_phrase(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        HIGH_VALUE_PHRASES.iter().any(|p| lower.contains(p))
    }
}

/// Process-wide catalog, compiled on first use.
pub fn catalog() -> &'static PatternCatalog {
    static CATALOG: OnceLock<PatternCatalog> = OnceLock::new();
    CATALOG.get_or_init(PatternCatalog::builtin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_compiles_every_rule() {
        assert_eq!(catalog().rules().len(), RULES.len());
    }

    #[test]
    fn test_every_category_has_rules() {
        for category in IssueCategory::ALL {
            assert!(
                catalog().rules().iter().any(|r| r.category == category),
                "no rules for {}",
                category
            );
        }
    }

    #[test]
    fn test_catalog_is_shared() {
        let a = catalog() as *const PatternCatalog;
        let b = catalog() as *const PatternCatalog;
        assert_eq!(a, b);
    }

    #[test]
    fn test_high_value_phrase() {
        assert!(catalog().has_high_value_phrase("Could you please clarify the requirements?"));
        assert!(!catalog().has_high_value_phrase("Creating src/app.js"));
    }
}
