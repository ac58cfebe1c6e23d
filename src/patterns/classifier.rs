//! Line classifier with confidence scoring and recurrence escalation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use super::catalog::{catalog, PatternCatalog};
use super::{Issue, IssueCategory, Severity};

/// Default trailing window for recurrence escalation.
pub const DEFAULT_RECURRENCE_WINDOW: Duration = Duration::from_secs(300);

/// Earlier occurrences of a category inside the window that escalate a new one.
pub const RECURRENCE_THRESHOLD: usize = 2;

/// Maximum characters of surrounding text kept on each side of a match.
const EXCERPT_RADIUS: usize = 80;

const BASE_CONFIDENCE: f64 = 0.5;
const CONCURRENT_MATCH_BONUS: f64 = 0.1;
const HIGH_SEVERITY_BONUS: f64 = 0.2;
const HIGH_VALUE_PHRASE_BONUS: f64 = 0.3;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 1.0;

/// Classifies output lines against the shared [`PatternCatalog`].
///
/// The only state is a short recurrence window per session, so two sessions
/// never influence each other.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    catalog: &'static PatternCatalog,
    window: Duration,
    recent: VecDeque<(IssueCategory, Instant)>,
}

impl PatternClassifier {
    /// Create a classifier backed by the process-wide catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: catalog(),
            window: DEFAULT_RECURRENCE_WINDOW,
            recent: VecDeque::new(),
        }
    }

    /// Set the recurrence window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Classify a line at the current instant.
    pub fn analyze(&mut self, line: &str) -> Vec<Issue> {
        self.analyze_at(line, Instant::now())
    }

    /// Classify a line as if observed at `now`.
    pub fn analyze_at(&mut self, line: &str, now: Instant) -> Vec<Issue> {
        let catalog = self.catalog;
        let matches: Vec<_> = catalog
            .rules()
            .iter()
            .filter_map(|rule| rule.matcher.find(line).map(|m| (rule, m)))
            .collect();

        if matches.is_empty() {
            return Vec::new();
        }

        let any_high = matches.iter().any(|(r, _)| r.severity == Severity::High);
        let any_permission = matches
            .iter()
            .any(|(r, _)| r.category == IssueCategory::Permission);
        let confidence = score(
            matches.len(),
            any_high,
            catalog.has_high_value_phrase(line),
        );

        self.expire(now);
        let mut categories: Vec<IssueCategory> = Vec::new();
        for (rule, _) in &matches {
            if !categories.contains(&rule.category) {
                categories.push(rule.category);
            }
        }
        let recurring: Vec<IssueCategory> = categories
            .iter()
            .copied()
            .filter(|c| {
                *c != IssueCategory::Progress && self.occurrences(*c) >= RECURRENCE_THRESHOLD
            })
            .collect();
        for category in &categories {
            self.recent.push_back((*category, now));
        }

        let timestamp = Utc::now();
        let issues: Vec<Issue> = matches
            .iter()
            .map(|(rule, m)| Issue {
                category: rule.category,
                type_tag: rule.type_tag.to_string(),
                severity: rule.severity,
                confidence,
                matched_text: m.as_str().to_string(),
                context_excerpt: excerpt(line, m.start(), m.end()),
                timestamp,
                intervention_required: any_high
                    || any_permission
                    || recurring.contains(&rule.category),
            })
            .collect();

        for issue in &issues {
            debug!("Classified: {}", issue.summary());
        }

        issues
    }

    /// Occurrences of a category currently inside the recurrence window.
    #[must_use]
    pub fn occurrences(&self, category: IssueCategory) -> usize {
        self.recent.iter().filter(|(c, _)| *c == category).count()
    }

    fn expire(&mut self, now: Instant) {
        while let Some((_, seen)) = self.recent.front() {
            if now.saturating_duration_since(*seen) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Confidence for a line with `match_count` matches.
fn score(match_count: usize, any_high: bool, high_value_phrase: bool) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    confidence += CONCURRENT_MATCH_BONUS * match_count.saturating_sub(1) as f64;
    if any_high {
        confidence += HIGH_SEVERITY_BONUS;
    }
    if high_value_phrase {
        confidence += HIGH_VALUE_PHRASE_BONUS;
    }
    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Text surrounding a match, cut on char boundaries.
fn excerpt(line: &str, start: usize, end: usize) -> String {
    let from = line[..start]
        .char_indices()
        .rev()
        .nth(EXCERPT_RADIUS.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    let to = line[end..]
        .char_indices()
        .nth(EXCERPT_RADIUS)
        .map_or(line.len(), |(i, _)| end + i);
    line[from..to].trim().to_string()
}
