//! Pattern classification of monitored-session output.
//!
//! Every output line is run against a declarative catalog of textual rules
//! grouped by [`IssueCategory`]. A line can match several rules at once; each
//! match becomes one [`Issue`].
//!
//! # Architecture
//!
//! ```text
//! output line ──> PatternClassifier ──> Vec<Issue>
//!                       │
//!                       ├── PatternCatalog (process-wide, read-only)
//!                       └── recurrence window (per session)
//! ```
//!
//! # Example
//!
//! ```
//! use overseer::patterns::{IssueCategory, PatternClassifier};
//!
//! let mut classifier = PatternClassifier::new();
//! let issues = classifier.analyze("npm error: command not found");
//! assert!(issues
//!     .iter()
//!     .any(|i| i.category == IssueCategory::Error && i.type_tag == "command_not_found"));
//! ```

pub mod catalog;
pub mod classifier;

pub use catalog::{catalog, PatternCatalog, PatternRule};
pub use classifier::PatternClassifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a detected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// The assistant is unsure what is being asked of it.
    Confusion,
    /// The assistant asks a question and waits for an answer.
    Question,
    /// The assistant asks for permission to act.
    Permission,
    /// The assistant or a tool reports an error.
    Error,
    /// Informational progress marker.
    Progress,
}

impl IssueCategory {
    /// All categories in catalog order.
    pub const ALL: [IssueCategory; 5] = [
        Self::Confusion,
        Self::Question,
        Self::Permission,
        Self::Error,
        Self::Progress,
    ];

    /// Returns the string representation of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confusion => "confusion",
            Self::Question => "question",
            Self::Permission => "permission",
            Self::Error => "error",
            Self::Progress => "progress",
        }
    }

    /// Priority used to pick the primary issue of a line (higher wins).
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::Error => 4,
            Self::Permission => 3,
            Self::Confusion => 2,
            Self::Question => 1,
            Self::Progress => 0,
        }
    }

    /// Whether issues of this category wait on an answer from someone.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Confusion | Self::Question | Self::Permission)
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a pattern rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One match of a rule against one output line.
///
/// Issues are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Category of the matched rule.
    pub category: IssueCategory,
    /// Rule-specific type tag (e.g. `command_not_found`).
    pub type_tag: String,
    /// Severity of the matched rule.
    pub severity: Severity,
    /// Confidence in `[0.1, 1.0]`.
    pub confidence: f64,
    /// Exact text matched by the rule.
    pub matched_text: String,
    /// Surrounding text from the line.
    pub context_excerpt: String,
    /// When the issue was detected.
    pub timestamp: DateTime<Utc>,
    /// Whether the issue warrants an intervention.
    pub intervention_required: bool,
}

impl Issue {
    /// Get a brief summary suitable for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[{}/{}] {} ({:.2})",
            self.category, self.severity, self.type_tag, self.confidence
        )
    }
}

/// Pick the issue that best represents a line.
///
/// Issues requiring intervention win over those that do not; then higher
/// severity, then category priority.
#[must_use]
pub fn primary_issue(issues: &[Issue]) -> Option<&Issue> {
    issues.iter().max_by_key(|issue| {
        (
            issue.intervention_required,
            issue.severity,
            issue.category.priority(),
        )
    })
}
