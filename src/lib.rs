//! Overseer - Supervision for interactive Claude Code sessions
//!
//! Overseer watches the output of a running coding-assistant CLI, recognizes
//! confusion, blocking questions, permission requests and errors, and
//! answers them from project context, or escalates them for review, while
//! tracking the session through a fixed delivery workflow.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`patterns`] - Pattern catalog and line classifier
//! - [`context`] - Project context, conditions, and the instruction file
//! - [`decision`] - Decision engine, policy tiers, history, throttling, recovery
//! - [`monitor`] - Output stream monitor and activity tracking
//! - [`workflow`] - Delivery-phase workflow tracker
//! - [`session`] - Supervision sessions and their async runtime
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Testing infrastructure (mocks, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use overseer::{Supervisor, SupervisorConfig};
//!
//! let config = SupervisorConfig::load(".")?;
//! let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
//! let supervisor = Supervisor::new(".", config).with_events(tx);
//!
//! let handle = supervisor.supervise_process(None, &[])?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! let status = handle.wait().await?;
//! ```

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod monitor;
pub mod patterns;
pub mod session;
pub mod testing;
pub mod workflow;

// Re-export commonly used types
pub use error::{OverseerError, Result};

pub use config::SupervisorConfig;

pub use patterns::{primary_issue, Issue, IssueCategory, PatternClassifier, Severity};

pub use context::{ContextHealth, ContextProvider, ProjectContext, ProjectType};

pub use decision::{Decision, DecisionEngine, DecisionKind, RequestShape, SupervisionMode};

pub use monitor::{ActivityKind, MonitorEvent, OutputChannel, StreamMonitor};

pub use workflow::{WorkflowPhase, WorkflowStatus, WorkflowTracker};

pub use session::{
    DeliveryAdapter, DeliveryCapability, EventKind, LifecycleState, SessionHandle, SessionStatus,
    SupervisionEvent, Supervisor,
};

pub use testing::{FailingDelivery, RecordingDelivery};
