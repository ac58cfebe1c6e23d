//! Decision making for detected issues.
//!
//! The [`DecisionEngine`] turns the issues found on one output line into a
//! [`Decision`]: a response text, a confidence, and whether a person has to
//! confirm it before it is delivered.
//!
//! # Architecture
//!
//! ```text
//! Issue(s) ──shape──> RequestShape ──policy──> Tier ──conditions──> confidence
//!                                                                       │
//!                                     SupervisionMode ──────────> escalate?
//!                                                                       │
//!                                   DecisionHistory <──record── Decision
//! ```

pub mod engine;
pub mod history;
pub mod policy;
pub mod recovery;
pub mod throttle;

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::OverseerError;
use crate::patterns::IssueCategory;

pub use engine::DecisionEngine;
pub use history::{normalize_question, DecisionHistory, DecisionStats, HistoryEntry};
pub use policy::{PolicyCatalog, PolicyRule, Tier};
pub use recovery::{ErrorClass, RecoveryAdvisor, RecoveryPlan};
pub use throttle::ResponseThrottle;

/// How much the engine is trusted to answer on its own.
///
/// # Example
///
/// ```
/// use overseer::decision::SupervisionMode;
///
/// let mode: SupervisionMode = "strict".parse().unwrap();
/// assert_eq!(mode, SupervisionMode::Strict);
/// assert_eq!(SupervisionMode::default().to_string(), "balanced");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SupervisionMode {
    /// Escalate anything below 0.9 confidence
    Strict,
    /// Pass the tiered result through
    #[default]
    Balanced,
    /// Auto-respond to anything above 0.4 outside the review tier
    Permissive,
    /// Same as balanced
    Auto,
}

impl SupervisionMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
            Self::Permissive => "permissive",
            Self::Auto => "auto",
        }
    }
}

impl std::fmt::Display for SupervisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SupervisionMode {
    type Err = OverseerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "permissive" => Ok(Self::Permissive),
            "auto" => Ok(Self::Auto),
            _ => Err(OverseerError::UnknownMode(s.to_string())),
        }
    }
}

/// What the monitored session is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestShape {
    /// Asks to proceed, continue, or be allowed to do something
    Procedural,
    /// Asks to pick between technologies or approaches
    TechnicalChoice,
    /// Asks about audience, style, or features
    Preference,
    /// Lacks information about the project
    Informational,
    /// Reports an error
    ErrorRecovery,
}

impl RequestShape {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Procedural => "procedural",
            Self::TechnicalChoice => "technical_choice",
            Self::Preference => "preference",
            Self::Informational => "informational",
            Self::ErrorRecovery => "error_recovery",
        }
    }
}

impl std::fmt::Display for RequestShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of response a decision carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Project overview and requirements for a confused session
    ContextInjection,
    /// Affirmative answer to a procedural or permission request
    Approval,
    /// Suggestion for a technical or preference question
    Answer,
    /// Remediation guidance for an error
    Recovery,
}

impl DecisionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextInjection => "context_injection",
            Self::Approval => "approval",
            Self::Answer => "answer",
            Self::Recovery => "recovery",
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The engine's answer to one line's issues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub response_text: String,
    pub confidence: f64,
    pub rationale: String,
    pub rule_matched: Option<String>,
    pub conditions_satisfied: Vec<String>,
    /// Must not be delivered without external confirmation.
    pub escalate: bool,
    pub kind: DecisionKind,
    pub shape: RequestShape,
    pub category: IssueCategory,
    /// Issue type tag the decision answers.
    pub type_tag: String,
    /// The output line that raised the issue.
    pub question: String,
}

impl Decision {
    /// Whether the response may be delivered without confirmation.
    #[must_use]
    pub fn is_auto(&self) -> bool {
        !self.escalate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_display() {
        for mode in [
            SupervisionMode::Strict,
            SupervisionMode::Balanced,
            SupervisionMode::Permissive,
            SupervisionMode::Auto,
        ] {
            assert_eq!(mode.as_str().parse::<SupervisionMode>().unwrap(), mode);
        }
        assert_eq!(
            " Permissive ".parse::<SupervisionMode>().unwrap(),
            SupervisionMode::Permissive
        );
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = "yolo".parse::<SupervisionMode>().unwrap_err();
        assert!(matches!(err, OverseerError::UnknownMode(ref m) if m == "yolo"));
    }

    #[test]
    fn test_mode_serde_is_lowercase() {
        let json = serde_json::to_string(&SupervisionMode::Strict).unwrap();
        assert_eq!(json, "\"strict\"");
        let mode: SupervisionMode = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(mode, SupervisionMode::Auto);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(DecisionKind::ContextInjection.as_str(), "context_injection");
        assert_eq!(RequestShape::TechnicalChoice.to_string(), "technical_choice");
    }
}
