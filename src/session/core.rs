//! Synchronous state of one supervision session.
//!
//! [`SessionCore`] composes the context provider, stream monitor, decision
//! engine, and workflow tracker. It never blocks and never waits: output goes
//! in, responses to deliver come out, and the async runtime decides when they
//! are actually sent.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::delivery::DeliveryCapability;
use super::events::{EventKind, EventSink};
use super::status::{LifecycleState, SessionStatistics, SessionStatus};
use crate::config::SupervisorConfig;
use crate::context::{ContextHealth, ContextProvider, ProjectContext};
use crate::decision::{Decision, DecisionEngine, DecisionKind, ErrorClass};
use crate::error::OverseerError;
use crate::monitor::{
    ContextSnapshot, ExitInfo, MonitorEvent, MonitorSummary, OutputChannel, ProgressMarker,
    StreamMonitor,
};
use crate::patterns::{IssueCategory, PatternClassifier};
use crate::workflow::{PhaseTransition, WorkflowEntry, WorkflowTracker};

/// A response waiting for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResponse {
    pub text: String,
    /// Line the response answers, if any.
    pub line: Option<String>,
    /// Decision behind the response; `None` for externally confirmed text.
    pub decision: Option<Decision>,
}

/// Per-session state machine driven by the runtime worker.
#[derive(Debug)]
pub struct SessionCore {
    config: SupervisorConfig,
    provider: ContextProvider,
    context: ProjectContext,
    monitor: StreamMonitor,
    engine: DecisionEngine,
    workflow: WorkflowTracker,
    events: EventSink,
    delivery: DeliveryCapability,
    stats: SessionStatistics,
    state: LifecycleState,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SessionCore {
    #[must_use]
    pub fn new(
        project_dir: impl AsRef<std::path::Path>,
        config: SupervisorConfig,
        delivery: DeliveryCapability,
        events: EventSink,
    ) -> Self {
        let provider = ContextProvider::new(project_dir)
            .with_requirements_files(config.requirement_candidates())
            .with_instructions_file(config.instructions_file.clone());
        let classifier = PatternClassifier::new().with_window(config.recurrence_window());
        let monitor = StreamMonitor::new(config.buffer_capacity).with_classifier(classifier);
        let engine = DecisionEngine::new(config.mode)
            .with_dedup_window(config.dedup_window())
            .with_history_capacity(config.history_capacity);
        let workflow = WorkflowTracker::new().with_streak_threshold(config.implementation_streak);

        Self {
            config,
            provider,
            context: ProjectContext::default(),
            monitor,
            engine,
            workflow,
            events,
            delivery,
            stats: SessionStatistics::default(),
            state: LifecycleState::Active,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    #[must_use]
    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    #[must_use]
    pub fn monitor(&self) -> &StreamMonitor {
        &self.monitor
    }

    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    #[must_use]
    pub fn workflow(&self) -> &WorkflowTracker {
        &self.workflow
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load the project context and pass the first two milestones.
    ///
    /// `requirements` overrides the requirements document on disk.
    pub fn start(&mut self, requirements: Option<&str>) {
        self.events.emit(EventKind::SupervisionStarted {
            mode: self.engine.mode(),
            delivery: self.delivery,
            project_dir: self.provider.project_dir().to_path_buf(),
        });

        self.context = self.provider.initialize(requirements);
        self.advance("prd_analysis");
        self.advance("claude_md_creation");
    }

    /// The monitored output is attached.
    pub fn attached(&mut self) {
        info!("Session {} attached to monitored output", self.session_id());
        self.advance("claude_code_launch");
    }

    /// Rebuild the project context from disk.
    pub fn refresh_context(&mut self) {
        self.context = self.provider.refresh();
    }

    /// Setup could not complete.
    pub fn fail(&mut self, error: &OverseerError) {
        if self.state.is_terminal() {
            return;
        }
        self.events.emit(EventKind::ClaudeCodeError {
            type_tag: "setup_failure".to_string(),
            message: error.to_string(),
            recoverable: false,
            escalate: true,
        });
        self.stats.errors_reported += 1;
        self.state = LifecycleState::Failed;
        self.events.emit(EventKind::SupervisionComplete {
            state: self.state,
            summary: None,
        });
    }

    /// End the session, emitting `supervisionComplete`.
    ///
    /// Returns `None` when the session had already ended.
    pub fn finish(&mut self, exit: Option<ExitInfo>, state: LifecycleState) -> Option<MonitorSummary> {
        if !self.is_active() {
            return None;
        }
        let trailing = self.monitor.flush_all();
        let unsent = self.handle_events(trailing);
        if !unsent.is_empty() {
            debug!(
                "Session {} ended with {} responses to trailing output unsent",
                self.session_id(),
                unsent.len()
            );
        }
        let summary = self.close(exit, state)?;
        self.events.emit(EventKind::SupervisionComplete {
            state,
            summary: Some(summary.clone()),
        });
        Some(summary)
    }

    /// End the session without emitting anything further.
    pub fn detach(&mut self) -> Option<MonitorSummary> {
        self.close(None, LifecycleState::Stopped)
    }

    fn close(&mut self, exit: Option<ExitInfo>, state: LifecycleState) -> Option<MonitorSummary> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = state;
        match self.monitor.close(exit) {
            MonitorEvent::Closed { summary } => {
                info!(
                    "Session {} {} after {} lines",
                    self.session_id(),
                    state,
                    summary.lines_processed
                );
                Some(summary)
            }
            _ => None,
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Feed raw output; returns the responses to deliver.
    pub fn handle_chunk(&mut self, channel: OutputChannel, chunk: &[u8]) -> Vec<PendingResponse> {
        if !self.is_active() {
            return Vec::new();
        }
        let events = self.monitor.ingest(channel, chunk);
        self.handle_events(events)
    }

    /// A channel reached end of output.
    pub fn handle_eof(&mut self, channel: OutputChannel) -> Vec<PendingResponse> {
        if !self.is_active() {
            return Vec::new();
        }
        let events = self.monitor.flush(channel);
        self.handle_events(events)
    }

    /// Feed one complete line.
    pub fn handle_line(&mut self, channel: OutputChannel, line: &str) -> Vec<PendingResponse> {
        if !self.is_active() {
            return Vec::new();
        }
        let events = self.monitor.process_line(channel, line);
        self.handle_events(events)
    }

    fn handle_events(&mut self, events: Vec<MonitorEvent>) -> Vec<PendingResponse> {
        let mut pending = Vec::new();
        for event in events {
            match event {
                MonitorEvent::Progress { marker } => self.on_progress(&marker),
                MonitorEvent::InterventionRequired {
                    issues,
                    line,
                    snapshot,
                    ..
                } => {
                    let Some(decision) = self.engine.decide(&issues, &line, &self.context) else {
                        // already answered; nothing left to wait for
                        self.monitor.resolve(&line);
                        continue;
                    };
                    if decision.escalate {
                        self.escalate(decision, line, snapshot);
                    } else {
                        if decision.kind == DecisionKind::Recovery {
                            self.report_error(&decision, false);
                        }
                        pending.push(PendingResponse {
                            text: decision.response_text.clone(),
                            line: Some(line),
                            decision: Some(decision),
                        });
                    }
                }
                MonitorEvent::Closed { .. } => {}
            }
        }
        pending
    }

    fn on_progress(&mut self, marker: &ProgressMarker) {
        for transition in self.workflow.observe_progress(marker.kind) {
            self.emit_transition(transition);
        }
    }

    fn escalate(&mut self, decision: Decision, line: String, snapshot: ContextSnapshot) {
        if decision.kind == DecisionKind::Recovery {
            self.report_error(&decision, true);
        }
        self.monitor.mark_escalated(&line);
        self.workflow.record_intervention(WorkflowEntry::new(
            self.workflow.current_phase(),
            line.clone(),
            "escalated for review",
        ));
        self.events.emit(EventKind::InterventionRequired {
            category: decision.category,
            type_tag: decision.type_tag.clone(),
            line,
            proposed: Some(decision),
            snapshot,
        });
    }

    fn report_error(&mut self, decision: &Decision, escalate: bool) {
        self.stats.errors_reported += 1;
        self.events.emit(EventKind::ClaudeCodeError {
            type_tag: decision.type_tag.clone(),
            message: decision.question.clone(),
            recoverable: ErrorClass::from_type_tag(&decision.type_tag) == ErrorClass::Recoverable,
            escalate,
        });
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Text confirmed from outside, answering the oldest escalated
    /// intervention.
    pub fn confirm(&self, text: impl Into<String>) -> PendingResponse {
        PendingResponse {
            text: text.into(),
            line: self
                .monitor
                .activity()
                .oldest_escalated()
                .map(|o| o.line.clone()),
            decision: None,
        }
    }

    /// A response reached the monitored session.
    pub fn on_delivered(&mut self, response: &PendingResponse) {
        let category = match (&response.decision, &response.line) {
            (Some(decision), _) => Some(decision.category),
            (None, Some(line)) => self
                .monitor
                .activity()
                .open_interventions()
                .iter()
                .find(|o| &o.line == line)
                .map(|o| o.category),
            (None, None) => None,
        };
        let trigger = response.line.clone().unwrap_or_default();
        let phase = self.workflow.current_phase();

        self.stats.interventions += 1;
        self.events.emit(EventKind::InterventionDelivered {
            line: response.line.clone(),
            response: response.text.clone(),
            kind: response.decision.as_ref().map(|d| d.kind),
            confidence: response.decision.as_ref().map(|d| d.confidence),
        });

        match category {
            Some(IssueCategory::Permission) => {
                self.stats.permissions_granted += 1;
                self.workflow.record_approval(WorkflowEntry::new(
                    phase,
                    trigger.clone(),
                    response.text.clone(),
                ));
                self.events.emit(EventKind::PermissionGranted {
                    request: trigger.clone(),
                    response: response.text.clone(),
                });
            }
            Some(IssueCategory::Question | IssueCategory::Confusion) => {
                self.stats.questions_answered += 1;
                self.events.emit(EventKind::QuestionAnswered {
                    question: trigger.clone(),
                    answer: response.text.clone(),
                });
            }
            _ => {}
        }
        if response
            .decision
            .as_ref()
            .is_some_and(|d| d.kind == DecisionKind::ContextInjection)
        {
            self.stats.context_injections += 1;
        }

        self.workflow
            .record_intervention(WorkflowEntry::new(phase, trigger, response.text.clone()));
        if let Some(ref line) = response.line {
            self.monitor.resolve(line);
        }
    }

    /// A response could not be delivered. Ingestion carries on.
    pub fn on_delivery_failed(&mut self, response: &PendingResponse, error: &OverseerError) {
        warn!(
            "Delivery to session {} failed: {}",
            self.session_id(),
            error
        );
        self.stats.errors_reported += 1;
        self.events.emit(EventKind::ClaudeCodeError {
            type_tag: "delivery_failed".to_string(),
            message: format!(
                "{} (response to: {})",
                error,
                response.line.as_deref().unwrap_or("confirmation")
            ),
            recoverable: error.is_recoverable(),
            escalate: false,
        });
    }

    // =========================================================================
    // Status
    // =========================================================================

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let decisions = self.engine.stats();
        let statistics = SessionStatistics {
            auto_approved: decisions.auto_approved,
            manual_review: decisions.manual_review,
            by_category: decisions.by_category.clone(),
            session_duration_secs: self.started.elapsed().as_secs_f64(),
            ..self.stats.clone()
        };
        SessionStatus {
            session_id: self.session_id().to_string(),
            state: self.state,
            mode: self.engine.mode(),
            delivery: self.delivery,
            workflow: self.workflow.status(),
            statistics,
            context: self.health(),
            last_activity: self.monitor.current_activity(),
            started_at: self.started_at,
        }
    }

    #[must_use]
    pub fn health(&self) -> ContextHealth {
        self.provider.health().clone()
    }

    fn advance(&mut self, completed: &str) {
        if let Some(transition) = self.workflow.advance(completed) {
            self.emit_transition(transition);
        }
    }

    fn emit_transition(&self, transition: PhaseTransition) {
        self.events.emit(EventKind::WorkflowPhaseAdvanced {
            from: transition.from,
            to: transition.to,
            completed: transition.completed,
        });
    }
}
