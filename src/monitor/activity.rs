//! Current-activity tracking and open intervention points.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patterns::{Issue, IssueCategory};

/// Progress markers kept in the history.
pub const MAX_PROGRESS_MARKERS: usize = 200;

/// Open interventions kept; the oldest is dropped beyond this.
pub const MAX_OPEN_INTERVENTIONS: usize = 50;

/// What the monitored session appears to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FileCreation,
    Implementation,
    Testing,
    Completion,
}

impl ActivityKind {
    /// Map a progress issue's type tag.
    #[must_use]
    pub fn from_type_tag(type_tag: &str) -> Option<Self> {
        match type_tag {
            "file_creation" => Some(Self::FileCreation),
            "implementation" => Some(Self::Implementation),
            "testing" => Some(Self::Testing),
            "completion" => Some(Self::Completion),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileCreation => "file_creation",
            Self::Implementation => "implementation",
            Self::Testing => "testing",
            Self::Completion => "completion",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detected progress marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMarker {
    pub kind: ActivityKind,
    pub line: String,
    pub timestamp: DateTime<Utc>,
}

/// A line that raised an intervention and has not been addressed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIntervention {
    pub line: String,
    pub category: IssueCategory,
    pub raised_at: DateTime<Utc>,
    /// Waiting for a person rather than for an automatic answer.
    pub escalated: bool,
}

impl OpenIntervention {
    /// Questions, confusion, and permission requests wait for an answer.
    #[must_use]
    pub fn is_question(&self) -> bool {
        matches!(
            self.category,
            IssueCategory::Question | IssueCategory::Confusion | IssueCategory::Permission
        )
    }
}

/// Tracks the current activity, progress history, and open interventions.
#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    current: Option<ActivityKind>,
    markers: VecDeque<ProgressMarker>,
    open: Vec<OpenIntervention>,
}

impl ActivityTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress markers found among a line's issues.
    ///
    /// Returns the markers added, in issue order, at most one per kind.
    pub fn observe(&mut self, line: &str, issues: &[Issue]) -> Vec<ProgressMarker> {
        let mut added: Vec<ProgressMarker> = Vec::new();
        for issue in issues
            .iter()
            .filter(|i| i.category == IssueCategory::Progress)
        {
            let Some(kind) = ActivityKind::from_type_tag(&issue.type_tag) else {
                continue;
            };
            if added.iter().any(|m| m.kind == kind) {
                continue;
            }
            let marker = ProgressMarker {
                kind,
                line: line.to_string(),
                timestamp: issue.timestamp,
            };
            if self.markers.len() == MAX_PROGRESS_MARKERS {
                self.markers.pop_front();
            }
            self.markers.push_back(marker.clone());
            self.current = Some(kind);
            added.push(marker);
        }
        added
    }

    /// Remember a line that raised an intervention.
    ///
    /// A line already open is replaced by the newer one.
    pub fn open_intervention(&mut self, line: &str, category: IssueCategory) {
        self.open.retain(|o| o.line != line);
        if self.open.len() == MAX_OPEN_INTERVENTIONS {
            let dropped = self.open.remove(0);
            debug!("Dropping stale intervention: {}", dropped.line);
        }
        self.open.push(OpenIntervention {
            line: line.to_string(),
            category,
            raised_at: Utc::now(),
            escalated: false,
        });
    }

    /// Flag the open intervention raised by `line` as waiting for a person.
    pub fn mark_escalated(&mut self, line: &str) -> bool {
        match self.open.iter_mut().find(|o| o.line == line) {
            Some(open) => {
                open.escalated = true;
                true
            }
            None => false,
        }
    }

    /// The longest-waiting escalated intervention.
    #[must_use]
    pub fn oldest_escalated(&self) -> Option<&OpenIntervention> {
        self.open.iter().find(|o| o.escalated)
    }

    /// Mark the intervention raised by `line` as addressed.
    pub fn resolve(&mut self, line: &str) -> bool {
        let before = self.open.len();
        self.open.retain(|o| o.line != line);
        self.open.len() != before
    }

    #[must_use]
    pub fn current(&self) -> Option<ActivityKind> {
        self.current
    }

    /// The last `n` progress markers, oldest first.
    #[must_use]
    pub fn recent_markers(&self, n: usize) -> Vec<ProgressMarker> {
        let skip = self.markers.len().saturating_sub(n);
        self.markers.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Lines with a question still waiting for an answer.
    #[must_use]
    pub fn unanswered_questions(&self) -> Vec<String> {
        self.open
            .iter()
            .filter(|o| o.is_question())
            .map(|o| o.line.clone())
            .collect()
    }

    /// Every intervention not yet addressed.
    #[must_use]
    pub fn open_interventions(&self) -> &[OpenIntervention] {
        &self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternClassifier;

    #[test]
    fn test_observe_tracks_current_activity() {
        let mut classifier = PatternClassifier::new();
        let mut tracker = ActivityTracker::new();

        let line = "Creating src/app.js";
        let added = tracker.observe(line, &classifier.analyze(line));
        assert_eq!(added.len(), 1);
        assert_eq!(tracker.current(), Some(ActivityKind::FileCreation));

        let line = "Running tests for the parser";
        tracker.observe(line, &classifier.analyze(line));
        assert_eq!(tracker.current(), Some(ActivityKind::Testing));
        assert_eq!(tracker.marker_count(), 2);
    }

    #[test]
    fn test_non_progress_lines_leave_activity_alone() {
        let mut classifier = PatternClassifier::new();
        let mut tracker = ActivityTracker::new();
        let line = "Should I proceed?";
        assert!(tracker.observe(line, &classifier.analyze(line)).is_empty());
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn test_open_and_resolve_interventions() {
        let mut tracker = ActivityTracker::new();
        tracker.open_intervention("Should I proceed?", IssueCategory::Question);
        tracker.open_intervention("error: boom", IssueCategory::Error);

        assert_eq!(tracker.unanswered_questions(), vec!["Should I proceed?"]);
        assert_eq!(tracker.open_interventions().len(), 2);

        assert!(tracker.resolve("Should I proceed?"));
        assert!(!tracker.resolve("Should I proceed?"));
        assert!(tracker.unanswered_questions().is_empty());
        assert_eq!(tracker.open_interventions().len(), 1);
    }

    #[test]
    fn test_escalated_interventions_are_tracked() {
        let mut tracker = ActivityTracker::new();
        tracker.open_intervention("Should I proceed?", IssueCategory::Question);
        tracker.open_intervention("May I delete the old log files?", IssueCategory::Permission);
        assert!(tracker.oldest_escalated().is_none());

        assert!(tracker.mark_escalated("May I delete the old log files?"));
        assert!(!tracker.mark_escalated("never raised"));
        let open = tracker.oldest_escalated().unwrap();
        assert_eq!(open.line, "May I delete the old log files?");
        assert_eq!(open.category, IssueCategory::Permission);
    }

    #[test]
    fn test_open_interventions_are_capped() {
        let mut tracker = ActivityTracker::new();
        for i in 0..MAX_OPEN_INTERVENTIONS + 10 {
            tracker.open_intervention(&format!("Question {i}?"), IssueCategory::Question);
        }
        tracker.open_intervention("Question 59?", IssueCategory::Question);

        let open = tracker.open_interventions();
        assert_eq!(open.len(), MAX_OPEN_INTERVENTIONS);
        assert_eq!(open[0].line, "Question 10?");
        assert_eq!(open.last().unwrap().line, "Question 59?");
    }

    #[test]
    fn test_recent_markers() {
        let mut classifier = PatternClassifier::new();
        let mut tracker = ActivityTracker::new();
        for i in 0..5 {
            let line = format!("Creating src/file{i}.js");
            tracker.observe(&line, &classifier.analyze(&line));
        }
        let recent = tracker.recent_markers(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].line, "Creating src/file4.js");
    }
}
