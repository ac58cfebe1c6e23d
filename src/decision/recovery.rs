//! Error classification and one-shot remediation.
//!
//! ```text
//! error type tag ──classify──> ErrorClass ──plan──> RecoveryPlan
//!                                                  (guidance | exhausted)
//! ```
//!
//! Each error type gets a single remediation attempt per session. A repeat of
//! the same type, or any critical error, is left to the orchestrating layer.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Remediation attempts allowed per error type.
pub const MAX_REMEDIATION_ATTEMPTS: u32 = 1;

/// How an error reported by the monitored session is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Access, missing-file, timeout and similar transient failures
    Recoverable,
    /// Syntax and parse failures, reported upward and never auto-remediated
    Critical,
}

impl ErrorClass {
    /// Classify an error issue by its type tag.
    #[must_use]
    pub fn from_type_tag(type_tag: &str) -> Self {
        match type_tag {
            "syntax_error" => Self::Critical,
            _ => Self::Recoverable,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of planning a recovery for one error occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPlan {
    pub type_tag: String,
    pub class: ErrorClass,
    /// Remediation text for the monitored session.
    pub guidance: String,
    /// 1-based occurrence count for this type.
    pub attempt: u32,
    /// True when no automatic remediation is offered.
    pub exhausted: bool,
}

impl RecoveryPlan {
    /// Whether the guidance may be sent automatically.
    #[must_use]
    pub fn auto_remediate(&self) -> bool {
        self.class == ErrorClass::Recoverable && !self.exhausted
    }
}

/// Tracks remediation attempts per error type.
#[derive(Debug, Clone, Default)]
pub struct RecoveryAdvisor {
    attempts: HashMap<String, u32>,
}

impl RecoveryAdvisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan the response to an error with `type_tag`.
    pub fn plan(&mut self, type_tag: &str, working_directory: &Path) -> RecoveryPlan {
        let class = ErrorClass::from_type_tag(type_tag);
        let attempt = {
            let count = self.attempts.entry(type_tag.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let exhausted = class == ErrorClass::Critical || attempt > MAX_REMEDIATION_ATTEMPTS;

        if exhausted {
            warn!(
                "Error '{}' ({}) needs attention: occurrence {}",
                type_tag, class, attempt
            );
        } else {
            debug!("Remediation for '{}' (attempt {})", type_tag, attempt);
        }

        RecoveryPlan {
            type_tag: type_tag.to_string(),
            class,
            guidance: guidance(type_tag, working_directory),
            attempt,
            exhausted,
        }
    }

    /// Occurrences seen for a type.
    #[must_use]
    pub fn attempts(&self, type_tag: &str) -> u32 {
        self.attempts.get(type_tag).copied().unwrap_or(0)
    }
}

fn guidance(type_tag: &str, dir: &Path) -> String {
    let dir = dir.display();
    match type_tag {
        "command_not_found" => format!(
            "The command is not available. Check that the tool is installed and on PATH, \
             or run it through the project's package scripts. Working directory: {dir}"
        ),
        "permission_denied" => format!(
            "Access was denied. Check the file permissions and keep all writes inside {dir}, \
             then retry the step."
        ),
        "file_not_found" => format!(
            "A file or module is missing. Check the path relative to {dir}, create the file \
             or install the module, then retry."
        ),
        "timeout" => "The operation timed out. Retry it once; if it times out again, split it \
                      into smaller steps."
            .to_string(),
        "syntax_error" => "A syntax error was reported. Fix the code at the reported location \
                           before continuing."
            .to_string(),
        "warning" => "The same warning keeps appearing. Fix it before continuing.".to_string(),
        _ => format!(
            "An error was reported. Read the error output, fix the reported problem in {dir}, \
             and retry the step."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(ErrorClass::from_type_tag("syntax_error"), ErrorClass::Critical);
        for tag in ["permission_denied", "file_not_found", "timeout", "command_not_found"] {
            assert_eq!(ErrorClass::from_type_tag(tag), ErrorClass::Recoverable);
        }
    }

    #[test]
    fn test_one_remediation_per_type() {
        let mut advisor = RecoveryAdvisor::new();
        let dir = Path::new("/work");

        let first = advisor.plan("file_not_found", dir);
        assert!(first.auto_remediate());
        assert!(first.guidance.contains("/work"));

        let second = advisor.plan("file_not_found", dir);
        assert!(second.exhausted);
        assert_eq!(second.attempt, 2);

        // other types are tracked separately
        assert!(advisor.plan("timeout", dir).auto_remediate());
    }

    #[test]
    fn test_critical_is_never_remediated() {
        let mut advisor = RecoveryAdvisor::new();
        let plan = advisor.plan("syntax_error", Path::new("."));
        assert!(plan.exhausted);
        assert!(!plan.auto_remediate());
    }

}
