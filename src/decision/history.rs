//! Bounded decision history and running statistics.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Decision;

/// Default number of entries kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One recorded decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub question_text: String,
    pub decision: Decision,
    pub confidence: f64,
    pub rationale: String,
    #[serde(skip)]
    normalized: String,
    #[serde(skip)]
    recorded_at: Instant,
}

/// Running totals over every decision ever recorded, trimmed or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionStats {
    pub total: usize,
    pub auto_approved: usize,
    pub manual_review: usize,
    pub by_category: BTreeMap<String, usize>,
}

/// Decision log, oldest entries dropped past the capacity.
#[derive(Debug, Clone)]
pub struct DecisionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    stats: DecisionStats,
}

impl DecisionHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity: capacity.max(1),
            stats: DecisionStats::default(),
        }
    }

    /// Append a decision made at `now`.
    pub fn record(&mut self, decision: &Decision, now: Instant) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            timestamp: Utc::now(),
            question_text: decision.question.clone(),
            decision: decision.clone(),
            confidence: decision.confidence,
            rationale: decision.rationale.clone(),
            normalized: normalize_question(&decision.question),
            recorded_at: now,
        });

        self.stats.total += 1;
        if decision.escalate {
            self.stats.manual_review += 1;
        } else {
            self.stats.auto_approved += 1;
        }
        *self
            .stats
            .by_category
            .entry(decision.category.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Whether an auto-answered question with the same normalized text was
    /// recorded within `window` of `now`.
    #[must_use]
    pub fn answered_within(&self, question: &str, window: Duration, now: Instant) -> bool {
        let normalized = normalize_question(question);
        self.entries.iter().rev().any(|entry| {
            !entry.decision.escalate
                && now.saturating_duration_since(entry.recorded_at) <= window
                && entry.normalized == normalized
        })
    }

    #[must_use]
    pub fn entries(&self) -> &VecDeque<HistoryEntry> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> &DecisionStats {
        &self.stats
    }
}

impl Default for DecisionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Lowercase, collapse whitespace, and drop trailing punctuation.
#[must_use]
pub fn normalize_question(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionKind, RequestShape};
    use crate::patterns::IssueCategory;

    fn decision(question: &str, escalate: bool) -> Decision {
        Decision {
            response_text: "Yes, please proceed.".into(),
            confidence: 0.9,
            rationale: "procedural".into(),
            rule_matched: None,
            conditions_satisfied: Vec::new(),
            escalate,
            kind: DecisionKind::Approval,
            shape: RequestShape::Procedural,
            category: IssueCategory::Question,
            type_tag: "procedural".into(),
            question: question.into(),
        }
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("  Should I   PROCEED?? "),
            "should i proceed"
        );
        assert_eq!(normalize_question(""), "");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = DecisionHistory::new(3);
        let now = Instant::now();
        for i in 0..5 {
            history.record(&decision(&format!("q{i}"), false), now);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries()[0].question_text, "q2");
        assert_eq!(history.stats().total, 5);
    }

    #[test]
    fn test_stats_split_auto_and_manual() {
        let mut history = DecisionHistory::default();
        let now = Instant::now();
        history.record(&decision("a", false), now);
        history.record(&decision("b", true), now);
        history.record(&decision("c", false), now);

        let stats = history.stats();
        assert_eq!(stats.auto_approved, 2);
        assert_eq!(stats.manual_review, 1);
        assert_eq!(stats.by_category.get("question"), Some(&3));
    }

    #[test]
    fn test_answered_within_window() {
        let mut history = DecisionHistory::default();
        let start = Instant::now();
        history.record(&decision("Should I proceed?", false), start);

        let window = Duration::from_secs(5);
        assert!(history.answered_within("should i  proceed", window, start + Duration::from_secs(2)));
        assert!(!history.answered_within("Should I proceed?", window, start + Duration::from_secs(6)));
        assert!(!history.answered_within("Should I stop?", window, start));
    }

    #[test]
    fn test_escalated_entries_do_not_count_as_answered() {
        let mut history = DecisionHistory::default();
        let now = Instant::now();
        history.record(&decision("Delete the repo?", true), now);
        assert!(!history.answered_within("Delete the repo?", Duration::from_secs(5), now));
    }
}
