//! Supervision sessions.
//!
//! A session composes the context provider, stream monitor, decision engine,
//! and workflow tracker for one monitored coding-assistant session.
//!
//! # Architecture
//!
//! ```text
//! Supervisor
//!   ├── supervise_process()  owns a spawned CLI, answers on its stdin
//!   ├── observe()            reads foreign output, emits responseReady
//!   └── attach()             any sources + any DeliveryAdapter
//!         │
//!         └── SessionHandle (status, confirm, stop, wait)
//!               └── worker task ── SessionCore
//!                     ├── ContextProvider
//!                     ├── StreamMonitor
//!                     ├── DecisionEngine
//!                     └── WorkflowTracker
//! ```
//!
//! Sessions never share mutable state. Events go to the channel given to
//! [`Supervisor::with_events`].

pub mod core;
pub mod delivery;
pub mod events;
pub mod process;
pub mod runtime;
pub mod status;

pub use self::core::{PendingResponse, SessionCore};
pub use delivery::{DeliveryAdapter, DeliveryCapability, EmitOnlyDelivery, StdinDelivery};
pub use events::{EventKind, EventSink, SupervisionEvent};
pub use process::{exit_info, locate, spawn_monitored};
pub use runtime::{OutputSource, SessionHandle, Supervisor};
pub use status::{LifecycleState, SessionStatistics, SessionStatus};
