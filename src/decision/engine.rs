//! The decision pipeline.
//!
//! For each line that needs an intervention the engine classifies the request
//! shape, matches the policy table, adjusts confidence by the rule's
//! conditions, and applies the supervision mode. Every decision is recorded
//! in the [`DecisionHistory`].

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::history::{DecisionHistory, DecisionStats, DEFAULT_HISTORY_CAPACITY};
use super::policy::{policy, PolicyCatalog, PolicyRule};
use super::recovery::RecoveryAdvisor;
use super::{Decision, DecisionKind, RequestShape, SupervisionMode};
use crate::context::{ConditionRegistry, ProjectContext, ProjectType};
use crate::patterns::{primary_issue, Issue, IssueCategory};

/// Default window in which a repeated question is suppressed.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(5000);

/// Confidence below which a decision escalates in balanced mode.
pub const AUTO_RESPONSE_THRESHOLD: f64 = 0.6;

/// Strict mode escalates anything below this.
pub const STRICT_THRESHOLD: f64 = 0.9;

/// Permissive mode auto-responds to anything above this, outside the review tier.
pub const PERMISSIVE_THRESHOLD: f64 = 0.4;

/// Multiplier applied when any rule condition is unsatisfied.
pub const UNSATISFIED_CONDITION_FACTOR: f64 = 0.6;

const PROCEED_RESPONSE: &str = "Yes, please proceed.";
const PERMISSION_RESPONSE: &str = "Yes, go ahead.";

/// Intermediate result before conditions and mode are applied.
struct Draft {
    response_text: String,
    confidence: f64,
    kind: DecisionKind,
    detail: String,
    rule: Option<&'static PolicyRule>,
    /// Escalates whatever the mode.
    forced: bool,
}

/// Per-session decision engine.
#[derive(Debug)]
pub struct DecisionEngine {
    mode: SupervisionMode,
    policy: &'static PolicyCatalog,
    conditions: ConditionRegistry,
    history: DecisionHistory,
    recovery: RecoveryAdvisor,
    dedup_window: Duration,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(mode: SupervisionMode) -> Self {
        Self {
            mode,
            policy: policy(),
            conditions: ConditionRegistry::builtin(),
            history: DecisionHistory::new(DEFAULT_HISTORY_CAPACITY),
            recovery: RecoveryAdvisor::new(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }

    #[must_use]
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = DecisionHistory::new(capacity);
        self
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: ConditionRegistry) -> Self {
        self.conditions = conditions;
        self
    }

    #[must_use]
    pub fn mode(&self) -> SupervisionMode {
        self.mode
    }

    #[must_use]
    pub fn history(&self) -> &DecisionHistory {
        &self.history
    }

    #[must_use]
    pub fn stats(&self) -> &DecisionStats {
        self.history.stats()
    }

    /// Decide on the issues raised by `line`.
    ///
    /// Returns `None` for progress-only lines and for a question already
    /// answered inside the dedup window.
    pub fn decide(
        &mut self,
        issues: &[Issue],
        line: &str,
        context: &ProjectContext,
    ) -> Option<Decision> {
        self.decide_at(issues, line, context, Instant::now())
    }

    /// [`decide`](Self::decide) as if called at `now`.
    pub fn decide_at(
        &mut self,
        issues: &[Issue],
        line: &str,
        context: &ProjectContext,
        now: Instant,
    ) -> Option<Decision> {
        let issue = primary_issue(issues)?;
        if issue.category == IssueCategory::Progress {
            return None;
        }
        if self.history.answered_within(line, self.dedup_window, now) {
            debug!("Suppressing duplicate response to: {}", line);
            return None;
        }

        let shape = classify_shape(issue);
        let draft = match shape {
            RequestShape::ErrorRecovery => self.draft_recovery(issue, context),
            _ => self.draft_answer(shape, issue, line, context),
        };

        let decision = self.finish(draft, shape, issue, line, context);
        self.history.record(&decision, now);

        if decision.escalate {
            warn!(
                "Escalating {} ({:.2}): {}",
                decision.kind, decision.confidence, decision.rationale
            );
        } else {
            info!(
                "Auto {} ({:.2}): {}",
                decision.kind, decision.confidence, decision.rationale
            );
        }
        Some(decision)
    }

    fn draft_recovery(&mut self, issue: &Issue, context: &ProjectContext) -> Draft {
        let plan = self
            .recovery
            .plan(&issue.type_tag, &context.working_directory);
        let auto = plan.auto_remediate();
        Draft {
            response_text: plan.guidance,
            confidence: if auto { 0.75 } else { 0.3 },
            kind: DecisionKind::Recovery,
            detail: format!(
                "{} error '{}', occurrence {}",
                plan.class, plan.type_tag, plan.attempt
            ),
            rule: None,
            forced: !auto,
        }
    }

    fn draft_answer(
        &self,
        shape: RequestShape,
        issue: &Issue,
        line: &str,
        context: &ProjectContext,
    ) -> Draft {
        let rule = self.policy.find(line);

        if let Some(rule) = rule.filter(|r| r.tier.always_escalates()) {
            return Draft {
                response_text: rule.response.to_string(),
                confidence: rule.confidence,
                kind: DecisionKind::Approval,
                detail: format!("'{}' requires review", rule.name),
                rule: Some(rule),
                forced: true,
            };
        }

        // confusion is answered with context whatever the wording
        if let Some(rule) = rule.filter(|_| issue.category != IssueCategory::Confusion) {
            return Draft {
                response_text: rule.response.to_string(),
                confidence: rule.confidence,
                kind: DecisionKind::Approval,
                detail: format!("matched {} rule '{}'", rule.tier, rule.name),
                rule: Some(rule),
                forced: false,
            };
        }

        match shape {
            RequestShape::Procedural => match issue.category {
                IssueCategory::Permission => Draft {
                    response_text: PERMISSION_RESPONSE.to_string(),
                    confidence: 0.7,
                    kind: DecisionKind::Approval,
                    detail: "routine permission request".to_string(),
                    rule: None,
                    forced: false,
                },
                _ => Draft {
                    response_text: PROCEED_RESPONSE.to_string(),
                    confidence: 0.9,
                    kind: DecisionKind::Approval,
                    detail: "asks to proceed".to_string(),
                    rule: None,
                    forced: false,
                },
            },
            RequestShape::TechnicalChoice => {
                let (response_text, confidence) = suggest_choice(context);
                Draft {
                    response_text,
                    confidence,
                    kind: DecisionKind::Answer,
                    detail: "technical choice".to_string(),
                    rule: None,
                    forced: false,
                }
            }
            RequestShape::Preference => {
                let (response_text, confidence) = suggest_preference(context);
                Draft {
                    response_text,
                    confidence,
                    kind: DecisionKind::Answer,
                    detail: "preference question".to_string(),
                    rule: None,
                    forced: false,
                }
            }
            RequestShape::Informational | RequestShape::ErrorRecovery => {
                let grounded = !context.requirements.is_empty() || context.overview.is_some();
                if issue.category == IssueCategory::Confusion {
                    Draft {
                        response_text: format!(
                            "{}\nProceed with the requirements above, starting with the first one \
                             that is not done yet.",
                            context_summary(context)
                        ),
                        confidence: if grounded { 0.8 } else { 0.5 },
                        kind: DecisionKind::ContextInjection,
                        detail: format!(
                            "confusion '{}', injected {} requirements",
                            issue.type_tag,
                            context.requirements.len()
                        ),
                        rule: None,
                        forced: false,
                    }
                } else {
                    Draft {
                        response_text: format!(
                            "{}\nUse this context to answer the question yourself and continue.",
                            context_summary(context)
                        ),
                        confidence: if grounded { 0.65 } else { 0.45 },
                        kind: DecisionKind::Answer,
                        detail: "open question".to_string(),
                        rule: None,
                        forced: false,
                    }
                }
            }
        }
    }

    fn finish(
        &self,
        draft: Draft,
        shape: RequestShape,
        issue: &Issue,
        line: &str,
        context: &ProjectContext,
    ) -> Decision {
        let mut confidence = draft.confidence;
        let mut conditions_satisfied = Vec::new();
        let mut unsatisfied = Vec::new();
        if let Some(rule) = draft.rule {
            for (name, holds) in self.conditions.evaluate(rule.conditions, context) {
                if holds {
                    conditions_satisfied.push(name);
                } else {
                    unsatisfied.push(name);
                }
            }
        }
        if !unsatisfied.is_empty() {
            confidence *= UNSATISFIED_CONDITION_FACTOR;
        }

        let mut escalate = draft.forced || confidence < AUTO_RESPONSE_THRESHOLD;
        match self.mode {
            SupervisionMode::Strict => {
                if confidence < STRICT_THRESHOLD {
                    escalate = true;
                }
            }
            SupervisionMode::Permissive => {
                if escalate && !draft.forced && confidence > PERMISSIVE_THRESHOLD {
                    escalate = false;
                }
            }
            SupervisionMode::Balanced | SupervisionMode::Auto => {}
        }

        let tier = draft.rule.map_or("none", |r| r.tier.as_str());
        let mut rationale = format!(
            "{}: {}; tier {}, mode {}",
            shape, draft.detail, tier, self.mode
        );
        if !unsatisfied.is_empty() {
            rationale.push_str(&format!("; unsatisfied: {}", unsatisfied.join(", ")));
        }

        Decision {
            response_text: draft.response_text,
            confidence,
            rationale,
            rule_matched: draft.rule.map(|r| r.name.to_string()),
            conditions_satisfied,
            escalate,
            kind: draft.kind,
            shape,
            category: issue.category,
            type_tag: issue.type_tag.clone(),
            question: line.to_string(),
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(SupervisionMode::default())
    }
}

/// Shape of the request behind an issue.
#[must_use]
pub fn classify_shape(issue: &Issue) -> RequestShape {
    match issue.category {
        IssueCategory::Error => RequestShape::ErrorRecovery,
        IssueCategory::Permission => RequestShape::Procedural,
        IssueCategory::Question => match issue.type_tag.as_str() {
            "procedural" => RequestShape::Procedural,
            "technical_choice" => RequestShape::TechnicalChoice,
            "preference" => RequestShape::Preference,
            _ => RequestShape::Informational,
        },
        IssueCategory::Confusion | IssueCategory::Progress => RequestShape::Informational,
    }
}

/// Overview, stack, working directory, and numbered requirements.
fn context_summary(context: &ProjectContext) -> String {
    let mut text = String::from("Project context:\n");
    if let Some(ref overview) = context.overview {
        text.push_str(&format!("Overview: {overview}\n"));
    }
    text.push_str(&format!(
        "Working directory: {}\n",
        context.working_directory.display()
    ));
    if context.project_type != ProjectType::Unknown {
        text.push_str(&format!("Project type: {}\n", context.project_type));
    }
    if !context.frameworks.is_empty() {
        let frameworks: Vec<&str> = context.frameworks.iter().map(String::as_str).collect();
        text.push_str(&format!("Frameworks: {}\n", frameworks.join(", ")));
    }
    if context.requirements.is_empty() {
        text.push_str("No requirements document was found; keep the implementation minimal.\n");
    } else {
        text.push_str("Requirements:\n");
        for (i, req) in context.requirements.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, req));
        }
    }
    text
}

fn suggest_choice(context: &ProjectContext) -> (String, f64) {
    if let Some(framework) = context.primary_framework() {
        return (
            format!("I'd suggest {framework}, since the project already uses it."),
            0.75,
        );
    }
    let pick = match context.project_type {
        ProjectType::WebApp | ProjectType::FullStack => Some("React"),
        ProjectType::Api => Some("Express"),
        ProjectType::Mobile => Some("React Native"),
        ProjectType::Cli | ProjectType::Library => {
            Some("the standard tooling of the language already in use")
        }
        ProjectType::Unknown => None,
    };
    match pick {
        Some(pick) => (
            format!(
                "I'd suggest {pick}, since it is a common fit for a {} project.",
                context.project_type
            ),
            0.7,
        ),
        None => (
            "I'd suggest the simplest option that meets the requirements, since nothing in the \
             project points to a specific choice."
                .to_string(),
            0.55,
        ),
    }
}

fn suggest_preference(context: &ProjectContext) -> (String, f64) {
    let grounding = context
        .overview
        .as_deref()
        .or_else(|| context.requirements.first().map(String::as_str));
    match grounding {
        Some(grounding) => (
            format!(
                "Based on the project description ({grounding}), keep it simple and consistent \
                 with the requirements. Adjust if the requirements say otherwise."
            ),
            0.7,
        ),
        None => (
            "Keep it simple and conventional; there is no project description to go on."
                .to_string(),
            0.5,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternClassifier;
    use std::path::PathBuf;

    fn populated() -> ProjectContext {
        ProjectContext {
            overview: Some("A todo app.".into()),
            requirements: vec!["Users can add todos".into(), "Users can delete todos".into()],
            project_type: ProjectType::WebApp,
            frameworks: ["react".to_string()].into_iter().collect(),
            working_directory: PathBuf::from("/work/todo"),
            ..ProjectContext::default()
        }
    }

    fn decide(engine: &mut DecisionEngine, line: &str, ctx: &ProjectContext) -> Option<Decision> {
        let issues = PatternClassifier::new().analyze(line);
        engine.decide(&issues, line, ctx)
    }

    #[test]
    fn test_confusion_gets_context_injection() {
        let mut engine = DecisionEngine::default();
        let d = decide(
            &mut engine,
            "Could you please clarify the requirements?",
            &populated(),
        )
        .unwrap();

        assert_eq!(d.kind, DecisionKind::ContextInjection);
        assert_eq!(d.kind.as_str(), "context_injection");
        assert!(!d.escalate);
        assert!(d.response_text.contains("1. Users can add todos"));
        assert!(d.response_text.contains("/work/todo"));
    }

    #[test]
    fn test_confusion_without_requirements_escalates() {
        let mut engine = DecisionEngine::default();
        let d = decide(
            &mut engine,
            "I'm not sure what you mean",
            &ProjectContext::default(),
        )
        .unwrap();
        assert!(d.escalate);
    }

    #[test]
    fn test_procedural_question_is_approved() {
        let mut engine = DecisionEngine::default();
        let d = decide(&mut engine, "Should I proceed?", &populated()).unwrap();
        assert_eq!(d.shape, RequestShape::Procedural);
        assert_eq!(d.response_text, "Yes, please proceed.");
        assert!(!d.escalate);
    }

    #[test]
    fn test_contextual_permission_by_mode() {
        let line = "May I create the following files: a, b, c?";

        let mut balanced = DecisionEngine::new(SupervisionMode::Balanced);
        let d = decide(&mut balanced, line, &populated()).unwrap();
        assert_eq!(d.rule_matched.as_deref(), Some("file_creation"));
        assert_eq!(d.conditions_satisfied, vec!["has_requirements".to_string()]);
        assert!(!d.escalate);

        let mut strict = DecisionEngine::new(SupervisionMode::Strict);
        assert!(decide(&mut strict, line, &populated()).unwrap().escalate);
    }

    #[test]
    fn test_unsatisfied_condition_lowers_confidence() {
        let line = "May I create the following files: a, b, c?";
        let empty = ProjectContext::default();

        let mut balanced = DecisionEngine::new(SupervisionMode::Balanced);
        let d = decide(&mut balanced, line, &empty).unwrap();
        assert!((d.confidence - 0.7 * UNSATISFIED_CONDITION_FACTOR).abs() < 1e-9);
        assert!(d.conditions_satisfied.is_empty());
        assert!(d.escalate);

        let mut permissive = DecisionEngine::new(SupervisionMode::Permissive);
        assert!(!decide(&mut permissive, line, &empty).unwrap().escalate);
    }

    #[test]
    fn test_review_tier_escalates_in_every_mode() {
        for mode in [
            SupervisionMode::Strict,
            SupervisionMode::Balanced,
            SupervisionMode::Permissive,
            SupervisionMode::Auto,
        ] {
            let mut engine = DecisionEngine::new(mode);
            let d = decide(&mut engine, "Should I delete the old tests?", &populated()).unwrap();
            assert!(d.escalate, "{mode}");
            assert_eq!(d.rule_matched.as_deref(), Some("deletion"));
        }
    }

    #[test]
    fn test_duplicate_question_is_suppressed_within_window() {
        let mut engine = DecisionEngine::default();
        let ctx = populated();
        let line = "Should I proceed?";
        let issues = PatternClassifier::new().analyze(line);
        let start = Instant::now();

        assert!(engine.decide_at(&issues, line, &ctx, start).is_some());
        assert!(engine
            .decide_at(&issues, "should i proceed", &ctx, start + Duration::from_secs(2))
            .is_none());
        assert!(engine
            .decide_at(&issues, line, &ctx, start + Duration::from_secs(6))
            .is_some());
        assert_eq!(engine.stats().total, 2);
    }

    #[test]
    fn test_error_gets_one_remediation() {
        let mut engine = DecisionEngine::default();
        let ctx = populated();
        let line = "npm error: command not found";
        let issues = PatternClassifier::new().analyze(line);
        let start = Instant::now();

        let first = engine.decide_at(&issues, line, &ctx, start).unwrap();
        assert_eq!(first.kind, DecisionKind::Recovery);
        assert_eq!(first.type_tag, "command_not_found");
        assert!(!first.escalate);

        let second = engine
            .decide_at(&issues, line, &ctx, start + Duration::from_secs(30))
            .unwrap();
        assert!(second.escalate);
    }

    #[test]
    fn test_syntax_error_is_never_auto_remediated() {
        let mut engine = DecisionEngine::new(SupervisionMode::Permissive);
        let d = decide(
            &mut engine,
            "SyntaxError: Unexpected token }",
            &populated(),
        )
        .unwrap();
        assert_eq!(d.kind, DecisionKind::Recovery);
        assert!(d.escalate);
    }

    #[test]
    fn test_technical_choice_prefers_detected_framework() {
        let mut engine = DecisionEngine::default();
        let d = decide(&mut engine, "Which framework should I use?", &populated()).unwrap();
        assert_eq!(d.shape, RequestShape::TechnicalChoice);
        assert!(d.response_text.starts_with("I'd suggest react"));
        assert!(!d.escalate);
    }

    #[test]
    fn test_safe_rule_applies_to_technical_choice() {
        let mut engine = DecisionEngine::default();
        let d = decide(
            &mut engine,
            "Which library should I add tests with?",
            &populated(),
        )
        .unwrap();
        assert_eq!(d.shape, RequestShape::TechnicalChoice);
        assert_eq!(d.rule_matched.as_deref(), Some("test_creation"));
        assert_eq!(d.response_text, "Yes, please add the tests.");
        assert!((d.confidence - 0.9).abs() < 1e-9);
        assert!(!d.escalate);
    }

    #[test]
    fn test_contextual_rule_applies_to_preference() {
        let mut engine = DecisionEngine::default();
        let d = decide(
            &mut engine,
            "Do you prefer that I install the packages with pnpm?",
            &populated(),
        )
        .unwrap();
        assert_eq!(d.shape, RequestShape::Preference);
        assert_eq!(d.rule_matched.as_deref(), Some("dependency_install"));
    }

    #[test]
    fn test_review_rule_wins_for_technical_choice() {
        let mut engine = DecisionEngine::new(SupervisionMode::Permissive);
        let d = decide(
            &mut engine,
            "Which database table should I truncate and reset?",
            &populated(),
        )
        .unwrap();
        assert_eq!(d.shape, RequestShape::TechnicalChoice);
        assert!(d.escalate);
    }

    #[test]
    fn test_preference_is_grounded() {
        let mut engine = DecisionEngine::default();
        let d = decide(&mut engine, "What style do you prefer for the UI?", &populated()).unwrap();
        assert_eq!(d.shape, RequestShape::Preference);
        assert!(d.response_text.contains("A todo app."));
    }

    #[test]
    fn test_progress_only_line_has_no_decision() {
        let mut engine = DecisionEngine::default();
        assert!(decide(&mut engine, "Creating src/app.js", &populated()).is_none());
        assert!(engine.history().is_empty());
    }
}
