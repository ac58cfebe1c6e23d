//! Async runtime for supervision sessions.
//!
//! Each session runs one worker task that owns its [`SessionCore`]. Reader
//! tasks forward raw output to the worker over a bounded channel, so lines
//! of one session are always processed one at a time and in order. Responses
//! go to a separate delivery task which applies the response throttle; a
//! throttled response never holds up line ingestion.
//!
//! ```text
//! stdout reader ─┐                         ┌─> delivery task ─> adapter
//!                ├─> chunks ─> worker ─────┤
//! stderr reader ─┘      ^        │         └─< outcomes
//!                       │        └─> status (watch), events (mpsc)
//!             liveness tick, commands, cancel
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::core::{PendingResponse, SessionCore};
use super::delivery::{DeliveryAdapter, DeliveryCapability, EmitOnlyDelivery, StdinDelivery};
use super::events::{EventSink, SupervisionEvent};
use super::process::{exit_info, spawn_monitored};
use super::status::{LifecycleState, SessionStatus};
use crate::config::SupervisorConfig;
use crate::decision::ResponseThrottle;
use crate::error::{OverseerError, Result};
use crate::monitor::{spawn_reader, ExitInfo, OutputChannel, OutputChunk};

/// A readable output stream of the monitored session.
pub type OutputSource = Box<dyn AsyncRead + Unpin + Send>;

/// Raw chunks buffered between readers and the worker.
const CHUNK_QUEUE: usize = 64;

/// How long output may keep arriving after the monitored process exited.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Starts supervision sessions for one project.
#[derive(Debug, Clone)]
pub struct Supervisor {
    project_dir: PathBuf,
    config: SupervisorConfig,
    events: Option<mpsc::UnboundedSender<SupervisionEvent>>,
}

impl Supervisor {
    #[must_use]
    pub fn new(project_dir: impl AsRef<Path>, config: SupervisorConfig) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            config,
            events: None,
        }
    }

    /// Send session events to `tx`.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SupervisionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Spawn the monitored CLI and supervise it, answering through its stdin.
    ///
    /// # Errors
    ///
    /// Fails with [`OverseerError::MissingExecutable`] or
    /// [`OverseerError::Spawn`] when the process cannot be started. The
    /// failure is also emitted as a `claudeCodeError` event.
    pub fn supervise_process(
        &self,
        requirements: Option<&str>,
        extra_args: &[String],
    ) -> Result<SessionHandle> {
        let events = self.sink();
        let mut core = self.core(DeliveryCapability::DirectInput, events);
        core.start(requirements);

        let mut args = self.config.claude_args.clone();
        args.extend_from_slice(extra_args);
        let mut child = match spawn_monitored(&self.config.claude_binary, &args, &self.project_dir)
        {
            Ok(child) => child,
            Err(e) => {
                core.fail(&e);
                return Err(e);
            }
        };

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let e = OverseerError::spawn(
                &self.config.claude_binary,
                "standard streams were not captured",
            );
            core.fail(&e);
            return Err(e);
        };

        let sources: Vec<(OutputChannel, OutputSource)> = vec![
            (OutputChannel::Stdout, Box::new(stdout)),
            (OutputChannel::Stderr, Box::new(stderr)),
        ];
        Ok(self.launch(core, sources, Box::new(StdinDelivery::new(stdin)), Some(child)))
    }

    /// Observe output produced elsewhere; responses become `responseReady`
    /// events for an external input adapter.
    pub fn observe<R>(&self, requirements: Option<&str>, source: R) -> SessionHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let events = self.sink();
        let delivery = EmitOnlyDelivery::new(events.clone());
        let mut core = self.core(DeliveryCapability::EmitOnly, events);
        core.start(requirements);
        self.launch(
            core,
            vec![(OutputChannel::Stdout, Box::new(source))],
            Box::new(delivery),
            None,
        )
    }

    /// Supervise arbitrary output sources with a caller-supplied adapter.
    pub fn attach(
        &self,
        requirements: Option<&str>,
        sources: Vec<(OutputChannel, OutputSource)>,
        delivery: Box<dyn DeliveryAdapter>,
    ) -> SessionHandle {
        let events = self.sink();
        let mut core = self.core(delivery.capability(), events);
        core.start(requirements);
        self.launch(core, sources, delivery, None)
    }

    fn sink(&self) -> EventSink {
        let id = uuid::Uuid::new_v4().to_string();
        match self.events {
            Some(ref tx) => EventSink::new(id, tx.clone()),
            None => EventSink::disabled(id),
        }
    }

    fn core(&self, delivery: DeliveryCapability, events: EventSink) -> SessionCore {
        SessionCore::new(&self.project_dir, self.config.clone(), delivery, events)
    }

    fn launch(
        &self,
        mut core: SessionCore,
        sources: Vec<(OutputChannel, OutputSource)>,
        delivery: Box<dyn DeliveryAdapter>,
        child: Option<Child>,
    ) -> SessionHandle {
        let owned = delivery.capability() == DeliveryCapability::DirectInput;
        let cancel = CancellationToken::new();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let open_channels = sources.len();
        for (channel, source) in sources {
            spawn_reader(channel, source, chunk_tx.clone(), cancel.child_token());
        }
        drop(chunk_tx);

        spawn_delivery(
            delivery,
            self.config.min_response_interval(),
            queue_rx,
            outcome_tx,
            cancel.child_token(),
        );

        core.attached();
        let id = core.session_id().to_string();
        let (status_tx, status_rx) = watch::channel(core.status());
        info!("Supervision session {} started", id);

        let worker = Worker {
            core,
            child,
            owned,
            cancel: cancel.clone(),
            chunks: chunk_rx,
            commands: command_rx,
            queue: queue_tx,
            outcomes: outcome_rx,
            status: status_tx,
            open_channels,
            in_flight: 0,
            exited: None,
            liveness: self.config.liveness_interval(),
        };

        SessionHandle {
            id,
            status: status_rx,
            commands: command_tx,
            cancel,
            worker: tokio::spawn(worker.run()),
        }
    }
}

/// Requests sent to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionCommand {
    Confirm(String),
    RefreshContext,
}

/// Result of one delivery attempt.
struct DeliveryOutcome {
    response: PendingResponse,
    result: Result<()>,
}

/// Control handle for a running session.
#[derive(Debug)]
pub struct SessionHandle {
    id: String,
    status: watch::Receiver<SessionStatus>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
    worker: JoinHandle<SessionStatus>,
}

impl SessionHandle {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest published status. Still available after the session ended.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Deliver externally confirmed text, answering the oldest open
    /// intervention. Goes through the throttle like any other response.
    ///
    /// # Errors
    ///
    /// Fails with [`OverseerError::SessionInactive`] once the session ended.
    pub fn confirm(&self, text: impl Into<String>) -> Result<()> {
        self.commands
            .send(SessionCommand::Confirm(text.into()))
            .map_err(|_| OverseerError::SessionInactive {
                session_id: self.id.clone(),
            })
    }

    /// Reload the project context from disk.
    ///
    /// # Errors
    ///
    /// Fails with [`OverseerError::SessionInactive`] once the session ended.
    pub fn refresh_context(&self) -> Result<()> {
        self.commands
            .send(SessionCommand::RefreshContext)
            .map_err(|_| OverseerError::SessionInactive {
                session_id: self.id.clone(),
            })
    }

    /// Token that stops the session when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the session and wait for its final status.
    pub async fn stop(self) -> Result<SessionStatus> {
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the session to end on its own.
    pub async fn wait(self) -> Result<SessionStatus> {
        self.worker
            .await
            .map_err(|e| OverseerError::Other(anyhow::anyhow!("session worker failed: {e}")))
    }
}

/// Sends queued responses through `adapter`, spaced by `min_interval`.
fn spawn_delivery(
    mut adapter: Box<dyn DeliveryAdapter>,
    min_interval: Duration,
    mut queue: mpsc::UnboundedReceiver<PendingResponse>,
    outcomes: mpsc::UnboundedSender<DeliveryOutcome>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut throttle = ResponseThrottle::new(min_interval);
        loop {
            let response = tokio::select! {
                _ = cancel.cancelled() => return,
                next = queue.recv() => match next {
                    Some(response) => response,
                    None => return,
                },
            };

            let slot = throttle.schedule(Instant::now().into_std());
            let slot = Instant::from_std(slot);
            if slot > Instant::now() {
                debug!(
                    "Throttling response for {:?}",
                    slot.saturating_duration_since(Instant::now())
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep_until(slot) => {}
            }

            let result = adapter.deliver(&response.text).await;
            throttle.mark_delivered(Instant::now().into_std());
            if outcomes.send(DeliveryOutcome { response, result }).is_err() {
                return;
            }
        }
    })
}

struct Worker {
    core: SessionCore,
    child: Option<Child>,
    owned: bool,
    cancel: CancellationToken,
    chunks: mpsc::Receiver<OutputChunk>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    queue: mpsc::UnboundedSender<PendingResponse>,
    outcomes: mpsc::UnboundedReceiver<DeliveryOutcome>,
    status: watch::Sender<SessionStatus>,
    open_channels: usize,
    in_flight: usize,
    /// Exit seen by the liveness tick while output was still open.
    exited: Option<(ExitInfo, Instant)>,
    liveness: Duration,
}

impl Worker {
    async fn run(mut self) -> SessionStatus {
        let mut liveness = tokio::time::interval(self.liveness);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let inputs_open = self.open_channels > 0;
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.shutdown().await;
                    break;
                }
                Some(chunk) = self.chunks.recv(), if inputs_open => self.on_chunk(chunk),
                Some(command) = self.commands.recv() => match command {
                    SessionCommand::Confirm(text) => {
                        let response = self.core.confirm(text);
                        self.enqueue(vec![response]);
                    }
                    SessionCommand::RefreshContext => self.core.refresh_context(),
                },
                Some(outcome) = self.outcomes.recv() => self.on_outcome(outcome),
                _ = liveness.tick(), if self.child.is_some() || self.exited.is_some() => {
                    if let Some(exit) = self.check_liveness() {
                        debug!("Waiting for remaining output after exit");
                        self.exited = Some((exit, Instant::now()));
                    } else if let Some((exit, at)) = self.exited.clone() {
                        if at.elapsed() >= EXIT_GRACE {
                            warn!("Output still open {:?} after exit; finishing", EXIT_GRACE);
                            self.drain_chunks();
                            self.core.finish(Some(exit), LifecycleState::Completed);
                            break;
                        }
                    }
                }
            }

            if self.open_channels == 0 && self.in_flight == 0 {
                let exit = match self.exited.take() {
                    Some((exit, _)) => Some(exit),
                    None => self.wait_for_exit().await,
                };
                self.core.finish(exit, LifecycleState::Completed);
                break;
            }
            self.publish();
        }

        self.cancel.cancel();
        self.publish();
        self.core.status()
    }

    fn on_chunk(&mut self, chunk: OutputChunk) {
        let responses = match chunk {
            OutputChunk::Data(channel, bytes) => self.core.handle_chunk(channel, &bytes),
            OutputChunk::Eof(channel) => {
                debug!("{} reached end of output", channel);
                self.open_channels = self.open_channels.saturating_sub(1);
                self.core.handle_eof(channel)
            }
        };
        self.enqueue(responses);
    }

    /// Process whatever output and delivery results are already queued.
    ///
    /// Used only when output will not end on its own.
    fn drain_chunks(&mut self) {
        while let Ok(chunk) = self.chunks.try_recv() {
            self.on_chunk(chunk);
        }
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.on_outcome(outcome);
        }
    }

    fn enqueue(&mut self, responses: Vec<PendingResponse>) {
        for response in responses {
            match self.queue.send(response) {
                Ok(()) => self.in_flight += 1,
                Err(mpsc::error::SendError(response)) => {
                    let error = OverseerError::delivery("delivery task is not running");
                    self.core.on_delivery_failed(&response, &error);
                }
            }
        }
    }

    fn on_outcome(&mut self, outcome: DeliveryOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome.result {
            Ok(()) => self.core.on_delivered(&outcome.response),
            Err(ref e) => self.core.on_delivery_failed(&outcome.response, e),
        }
    }

    /// Exit information once an owned process has ended.
    fn check_liveness(&mut self) -> Option<ExitInfo> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                let exit = exit_info(status);
                info!("Monitored process ended: {}", exit);
                self.child = None;
                Some(exit)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Liveness check failed: {}", e);
                None
            }
        }
    }

    async fn wait_for_exit(&mut self) -> Option<ExitInfo> {
        let mut child = self.child.take()?;
        tokio::select! {
            _ = self.cancel.cancelled() => {
                let _ = child.kill().await;
                child.try_wait().ok().flatten().map(exit_info)
            }
            status = child.wait() => status.ok().map(exit_info),
        }
    }

    async fn shutdown(&mut self) {
        info!("Stopping session {}", self.core.session_id());
        if !self.owned {
            self.core.detach();
            return;
        }
        let exit = match self.child.take() {
            None => self.exited.take().map(|(exit, _)| exit),
            Some(mut child) => {
                if let Err(e) = child.kill().await {
                    debug!("Kill failed (process may have exited): {}", e);
                }
                child.try_wait().ok().flatten().map(exit_info)
            }
        };
        self.core.finish(exit, LifecycleState::Stopped);
    }

    fn publish(&self) {
        self.status.send_replace(self.core.status());
    }
}
