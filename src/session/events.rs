//! Events emitted by a supervision session.
//!
//! Events go to an explicit channel handed to the session at construction.
//! Every event carries the session id and a timestamp.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::delivery::DeliveryCapability;
use super::status::LifecycleState;
use crate::decision::{Decision, DecisionKind, SupervisionMode};
use crate::monitor::{ContextSnapshot, MonitorSummary};
use crate::patterns::IssueCategory;
use crate::workflow::WorkflowPhase;

/// Payload of a supervision event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EventKind {
    #[serde(rename_all = "camelCase")]
    SupervisionStarted {
        mode: SupervisionMode,
        delivery: DeliveryCapability,
        project_dir: PathBuf,
    },
    /// A line needs a response that will not be sent automatically.
    #[serde(rename_all = "camelCase")]
    InterventionRequired {
        line: String,
        category: IssueCategory,
        type_tag: String,
        /// Response the engine would send, for a person to confirm.
        proposed: Option<Decision>,
        snapshot: ContextSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    InterventionDelivered {
        line: Option<String>,
        response: String,
        kind: Option<DecisionKind>,
        confidence: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    QuestionAnswered { question: String, answer: String },
    #[serde(rename_all = "camelCase")]
    PermissionGranted { request: String, response: String },
    /// Emit-only delivery: the response for an external input adapter.
    #[serde(rename_all = "camelCase")]
    ResponseReady { text: String },
    #[serde(rename_all = "camelCase")]
    WorkflowPhaseAdvanced {
        from: WorkflowPhase,
        to: WorkflowPhase,
        completed: String,
    },
    #[serde(rename_all = "camelCase")]
    ClaudeCodeError {
        type_tag: String,
        message: String,
        recoverable: bool,
        escalate: bool,
    },
    #[serde(rename_all = "camelCase")]
    SupervisionComplete {
        state: LifecycleState,
        summary: Option<MonitorSummary>,
    },
}

impl EventKind {
    /// Event name as emitted on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SupervisionStarted { .. } => "supervisionStarted",
            Self::InterventionRequired { .. } => "interventionRequired",
            Self::InterventionDelivered { .. } => "interventionDelivered",
            Self::QuestionAnswered { .. } => "questionAnswered",
            Self::PermissionGranted { .. } => "permissionGranted",
            Self::ResponseReady { .. } => "responseReady",
            Self::WorkflowPhaseAdvanced { .. } => "workflowPhaseAdvanced",
            Self::ClaudeCodeError { .. } => "claudeCodeError",
            Self::SupervisionComplete { .. } => "supervisionComplete",
        }
    }
}

/// An event with its session and time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl SupervisionEvent {
    #[must_use]
    pub fn new(session_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Sending half of a session's event channel.
///
/// A dropped receiver is not an error: events are simply discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    session_id: String,
    tx: Option<mpsc::UnboundedSender<SupervisionEvent>>,
}

impl EventSink {
    #[must_use]
    pub fn new(session_id: impl Into<String>, tx: mpsc::UnboundedSender<SupervisionEvent>) -> Self {
        Self {
            session_id: session_id.into(),
            tx: Some(tx),
        }
    }

    /// A sink that discards everything.
    #[must_use]
    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tx: None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn emit(&self, kind: EventKind) {
        let event = SupervisionEvent::new(self.session_id.clone(), kind);
        debug!("Event {} for session {}", event.name(), self.session_id);
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }
}
