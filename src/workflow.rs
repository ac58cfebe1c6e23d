//! Project-delivery workflow tracking.
//!
//! A supervision session walks a fixed, ordered list of [`WorkflowPhase`]s.
//! The phase index only ever moves forward and `completion` is terminal.
//!
//! Phases advance explicitly at orchestrator milestones, or implicitly from
//! progress markers seen in the monitored output:
//!
//! ```text
//! implementation x N  : requirements_resolution ──> implementation
//! testing             : implementation          ──> validation
//! completion          : any phase               ──> ... ──> completion
//! ```

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::monitor::ActivityKind;

/// Default number of consecutive implementation markers that start implementation.
pub const DEFAULT_IMPLEMENTATION_STREAK: u32 = 3;

/// One stage of the delivery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    PrdAnalysis,
    ClaudeMdCreation,
    ClaudeCodeLaunch,
    RequirementsResolution,
    Implementation,
    Validation,
    Completion,
}

impl WorkflowPhase {
    /// All phases in delivery order.
    pub const ALL: [WorkflowPhase; 7] = [
        Self::PrdAnalysis,
        Self::ClaudeMdCreation,
        Self::ClaudeCodeLaunch,
        Self::RequirementsResolution,
        Self::Implementation,
        Self::Validation,
        Self::Completion,
    ];

    /// Number of phases.
    pub const COUNT: usize = Self::ALL.len();

    /// Phase at a given index, clamped to the last phase.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::COUNT - 1)]
    }

    /// Position of this phase in the sequence.
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Returns the string representation of the phase.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrdAnalysis => "prd_analysis",
            Self::ClaudeMdCreation => "claude_md_creation",
            Self::ClaudeCodeLaunch => "claude_code_launch",
            Self::RequirementsResolution => "requirements_resolution",
            Self::Implementation => "implementation",
            Self::Validation => "validation",
            Self::Completion => "completion",
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An intervention or approval recorded against the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEntry {
    pub timestamp: DateTime<Utc>,
    /// Phase the entry was recorded in.
    pub phase: WorkflowPhase,
    /// What triggered the entry (usually the monitored line).
    pub trigger: String,
    /// What was done about it.
    pub action: String,
}

impl WorkflowEntry {
    pub fn new(phase: WorkflowPhase, trigger: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            phase,
            trigger: trigger.into(),
            action: action.into(),
        }
    }
}

/// A phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub from: WorkflowPhase,
    pub to: WorkflowPhase,
    /// Label supplied by whoever completed the previous phase.
    pub completed: String,
}

/// Workflow state owned by one supervision session.
#[derive(Debug, Clone)]
pub struct Workflow {
    current_phase_index: usize,
    phase_start_time: Instant,
    phase_started_at: DateTime<Utc>,
    interventions: Vec<WorkflowEntry>,
    approvals: Vec<WorkflowEntry>,
}

impl Workflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_phase_index: 0,
            phase_start_time: Instant::now(),
            phase_started_at: Utc::now(),
            interventions: Vec::new(),
            approvals: Vec::new(),
        }
    }

    #[must_use]
    pub fn current_phase(&self) -> WorkflowPhase {
        WorkflowPhase::from_index(self.current_phase_index)
    }

    #[must_use]
    pub fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    #[must_use]
    pub fn interventions(&self) -> &[WorkflowEntry] {
        &self.interventions
    }

    #[must_use]
    pub fn approvals(&self) -> &[WorkflowEntry] {
        &self.approvals
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable workflow snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub phase: WorkflowPhase,
    pub phase_index: usize,
    /// `phase_index / phase_count`.
    pub progress: f64,
    pub phase_duration_secs: f64,
    pub phase_started_at: DateTime<Utc>,
    pub interventions: usize,
    pub approvals: usize,
}

/// Drives a [`Workflow`] forward.
#[derive(Debug, Clone)]
pub struct WorkflowTracker {
    workflow: Workflow,
    implementation_streak: u32,
    streak_threshold: u32,
}

impl WorkflowTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            workflow: Workflow::new(),
            implementation_streak: 0,
            streak_threshold: DEFAULT_IMPLEMENTATION_STREAK,
        }
    }

    /// Set how many consecutive implementation markers start implementation.
    #[must_use]
    pub fn with_streak_threshold(mut self, threshold: u32) -> Self {
        self.streak_threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    #[must_use]
    pub fn current_phase(&self) -> WorkflowPhase {
        self.workflow.current_phase()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_phase() == WorkflowPhase::Completion
    }

    /// Move to the next phase, marking the current one as completed.
    ///
    /// Returns `None` once `completion` has been reached.
    pub fn advance(&mut self, completed: &str) -> Option<PhaseTransition> {
        if self.is_complete() {
            return None;
        }

        let from = self.current_phase();
        self.workflow.current_phase_index =
            (self.workflow.current_phase_index + 1).min(WorkflowPhase::COUNT - 1);
        self.workflow.phase_start_time = Instant::now();
        self.workflow.phase_started_at = Utc::now();
        let to = self.current_phase();

        info!("Workflow phase advanced: {} -> {} ({})", from, to, completed);
        Some(PhaseTransition {
            from,
            to,
            completed: completed.to_string(),
        })
    }

    /// Feed a progress marker from the monitored output.
    ///
    /// The implementation streak counts consecutive implementation markers;
    /// any other marker breaks it. Lines without a marker leave it alone.
    pub fn observe_progress(&mut self, marker: ActivityKind) -> Vec<PhaseTransition> {
        let mut transitions = Vec::new();

        match marker {
            ActivityKind::FileCreation => self.implementation_streak = 0,
            ActivityKind::Implementation => {
                self.implementation_streak += 1;
                if self.current_phase() == WorkflowPhase::RequirementsResolution
                    && self.implementation_streak >= self.streak_threshold
                {
                    transitions.extend(self.advance("requirements_resolution"));
                }
            }
            ActivityKind::Testing => {
                self.implementation_streak = 0;
                if self.current_phase() == WorkflowPhase::Implementation {
                    transitions.extend(self.advance("implementation"));
                }
            }
            ActivityKind::Completion => {
                self.implementation_streak = 0;
                while let Some(t) = self.advance(marker.as_str()) {
                    transitions.push(t);
                }
            }
        }

        transitions
    }

    pub fn record_intervention(&mut self, entry: WorkflowEntry) {
        self.workflow.interventions.push(entry);
    }

    pub fn record_approval(&mut self, entry: WorkflowEntry) {
        self.workflow.approvals.push(entry);
    }

    #[must_use]
    pub fn status(&self) -> WorkflowStatus {
        let phase = self.current_phase();
        WorkflowStatus {
            phase,
            phase_index: phase.index(),
            progress: phase.index() as f64 / WorkflowPhase::COUNT as f64,
            phase_duration_secs: self.workflow.phase_start_time.elapsed().as_secs_f64(),
            phase_started_at: self.workflow.phase_started_at,
            interventions: self.workflow.interventions.len(),
            approvals: self.workflow.approvals.len(),
        }
    }
}

impl Default for WorkflowTracker {
    fn default() -> Self {
        Self::new()
    }
}
