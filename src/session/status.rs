//! Queryable session status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::delivery::DeliveryCapability;
use crate::context::ContextHealth;
use crate::decision::SupervisionMode;
use crate::monitor::ActivityKind;
use crate::workflow::WorkflowStatus;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Attached to a live output stream
    Active,
    /// The monitored output ended
    Completed,
    /// Stopped on request
    Stopped,
    /// Setup failed or the session could not continue
    Failed,
}

impl LifecycleState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether the session has ended and is now read-only.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Running counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatistics {
    /// Responses delivered to the monitored session
    pub interventions: usize,
    pub questions_answered: usize,
    pub permissions_granted: usize,
    pub context_injections: usize,
    pub errors_reported: usize,
    pub auto_approved: usize,
    pub manual_review: usize,
    pub by_category: BTreeMap<String, usize>,
    pub session_duration_secs: f64,
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub state: LifecycleState,
    pub mode: SupervisionMode,
    pub delivery: DeliveryCapability,
    pub workflow: WorkflowStatus,
    pub statistics: SessionStatistics,
    pub context: ContextHealth,
    pub last_activity: Option<ActivityKind>,
    pub started_at: DateTime<Utc>,
}

impl SessionStatus {
    /// Short human-readable report.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Session {} {} | phase {} ({:.0}%) | {} interventions, {} auto, {} review | {:.1}s",
            self.session_id,
            self.state,
            self.workflow.phase,
            self.workflow.progress * 100.0,
            self.statistics.interventions,
            self.statistics.auto_approved,
            self.statistics.manual_review,
            self.statistics.session_duration_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_state() {
        assert!(!LifecycleState::Active.is_terminal());
        assert!(LifecycleState::Stopped.is_terminal());
        assert_eq!(
            serde_json::to_string(&LifecycleState::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_statistics_serialize_camel_case() {
        let stats = SessionStatistics {
            questions_answered: 2,
            ..SessionStatistics::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["questionsAnswered"], 2);
        assert_eq!(json["contextInjections"], 0);
    }
}
