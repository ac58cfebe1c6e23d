//! Output stream monitoring.
//!
//! The [`StreamMonitor`] turns raw output from a monitored session into
//! classified lines. It keeps a bounded buffer per output channel plus the
//! full session log, tracks the current activity, and raises
//! [`MonitorEvent`]s when a line needs an intervention.
//!
//! Line handling is synchronous and owned by a single session worker.
//! [`spawn_reader`] is the async side: it reads an output source and forwards
//! raw chunks to that worker over a channel.
//!
//! # Example
//!
//! ```
//! use overseer::monitor::{MonitorEvent, OutputChannel, StreamMonitor};
//!
//! let mut monitor = StreamMonitor::new(1000);
//! let events = monitor.ingest(OutputChannel::Stdout, "Could you please clarify?\n");
//! assert!(matches!(events[0], MonitorEvent::InterventionRequired { .. }));
//! ```

pub mod activity;
pub mod buffer;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::patterns::{primary_issue, Issue, PatternClassifier};

pub use activity::{ActivityKind, ActivityTracker, OpenIntervention, ProgressMarker};
pub use buffer::{strip_ansi, LineSplitter, RingBuffer, DEFAULT_BUFFER_CAPACITY};

/// Lines of recent output carried in a snapshot.
pub const SNAPSHOT_TAIL: usize = 20;

/// Progress markers carried in a snapshot.
pub const SNAPSHOT_MARKERS: usize = 10;

const READ_CHUNK: usize = 4096;

/// Which stream of the monitored session a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

impl OutputChannel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of the full session log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub channel: OutputChannel,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// State of the monitor at the moment an intervention was raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub recent_output: Vec<String>,
    pub unanswered_questions: Vec<String>,
    pub current_activity: Option<ActivityKind>,
    pub recent_progress: Vec<ProgressMarker>,
}

/// How the monitored process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown exit"),
        }
    }
}

/// Final report emitted when the monitored output ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSummary {
    pub exit: Option<ExitInfo>,
    pub unresolved_questions: Vec<String>,
    pub unaddressed_interventions: Vec<String>,
    pub last_activity: Option<ActivityKind>,
    pub lines_processed: usize,
    pub issues_detected: usize,
}

/// Events raised while processing output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MonitorEvent {
    /// A line needs a response or a person.
    #[serde(rename_all = "camelCase")]
    InterventionRequired {
        issues: Vec<Issue>,
        line: String,
        channel: OutputChannel,
        snapshot: ContextSnapshot,
    },
    /// A progress marker was detected.
    Progress { marker: ProgressMarker },
    /// The output ended.
    Closed { summary: MonitorSummary },
}

/// Raw output forwarded from a reader task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Data(OutputChannel, Vec<u8>),
    Eof(OutputChannel),
}

/// Line-level monitor for one supervision session.
#[derive(Debug)]
pub struct StreamMonitor {
    classifier: PatternClassifier,
    stdout_split: LineSplitter,
    stderr_split: LineSplitter,
    stdout: RingBuffer<String>,
    stderr: RingBuffer<String>,
    log: Vec<LogLine>,
    activity: ActivityTracker,
    lines_processed: usize,
    issues_detected: usize,
    closed: bool,
}

impl StreamMonitor {
    /// Monitor keeping `buffer_capacity` lines per channel.
    #[must_use]
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            classifier: PatternClassifier::new(),
            stdout_split: LineSplitter::new(),
            stderr_split: LineSplitter::new(),
            stdout: RingBuffer::new(buffer_capacity),
            stderr: RingBuffer::new(buffer_capacity),
            log: Vec::new(),
            activity: ActivityTracker::new(),
            lines_processed: 0,
            issues_detected: 0,
            closed: false,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: PatternClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Feed a raw chunk of output; complete lines are processed in order.
    pub fn ingest(&mut self, channel: OutputChannel, chunk: impl AsRef<[u8]>) -> Vec<MonitorEvent> {
        let lines = self.splitter(channel).push(chunk.as_ref());
        lines
            .iter()
            .flat_map(|line| self.process_line(channel, line))
            .collect()
    }

    /// Process the unterminated remainder of a channel at end of output.
    pub fn flush(&mut self, channel: OutputChannel) -> Vec<MonitorEvent> {
        match self.splitter(channel).finish() {
            Some(line) => self.process_line(channel, &line),
            None => Vec::new(),
        }
    }

    /// Classify one complete line.
    pub fn process_line(&mut self, channel: OutputChannel, line: &str) -> Vec<MonitorEvent> {
        if self.closed {
            debug!("Ignoring line after close: {}", line);
            return Vec::new();
        }

        self.lines_processed += 1;
        self.log.push(LogLine {
            channel,
            text: line.to_string(),
            timestamp: Utc::now(),
        });
        match channel {
            OutputChannel::Stdout => self.stdout.push(line.to_string()),
            OutputChannel::Stderr => self.stderr.push(line.to_string()),
        };

        if line.trim().is_empty() {
            return Vec::new();
        }

        let issues = self.classifier.analyze(line);
        if issues.is_empty() {
            return Vec::new();
        }
        self.issues_detected += issues.len();

        let mut events: Vec<MonitorEvent> = self
            .activity
            .observe(line, &issues)
            .into_iter()
            .map(|marker| MonitorEvent::Progress { marker })
            .collect();

        if issues.iter().any(|i| i.intervention_required) {
            if let Some(primary) = primary_issue(&issues) {
                self.activity.open_intervention(line, primary.category);
                info!("Intervention required on {}: {}", channel, primary.summary());
            }
            events.push(MonitorEvent::InterventionRequired {
                snapshot: self.snapshot(),
                issues,
                line: line.to_string(),
                channel,
            });
        }

        events
    }

    /// Mark the intervention raised by `line` as addressed.
    pub fn resolve(&mut self, line: &str) -> bool {
        self.activity.resolve(line)
    }

    /// Mark the intervention raised by `line` as waiting for a person.
    pub fn mark_escalated(&mut self, line: &str) -> bool {
        self.activity.mark_escalated(line)
    }

    /// Process the unterminated remainder of every channel.
    pub fn flush_all(&mut self) -> Vec<MonitorEvent> {
        let mut events = self.flush(OutputChannel::Stdout);
        events.extend(self.flush(OutputChannel::Stderr));
        events
    }

    /// End monitoring and build the final summary.
    ///
    /// Call [`flush_all`](Self::flush_all) first to act on trailing partial
    /// lines; anything still buffered here is counted but its events are
    /// dropped. Further input is ignored.
    pub fn close(&mut self, exit: Option<ExitInfo>) -> MonitorEvent {
        if !self.closed {
            let dropped = self.flush_all();
            if !dropped.is_empty() {
                debug!("Dropped {} events from trailing output at close", dropped.len());
            }
            self.closed = true;
        }

        let summary = MonitorSummary {
            exit,
            unresolved_questions: self.activity.unanswered_questions(),
            unaddressed_interventions: self
                .activity
                .open_interventions()
                .iter()
                .map(|o| o.line.clone())
                .collect(),
            last_activity: self.activity.current(),
            lines_processed: self.lines_processed,
            issues_detected: self.issues_detected,
        };
        if !summary.unaddressed_interventions.is_empty() {
            warn!(
                "Output closed with {} unaddressed interventions",
                summary.unaddressed_interventions.len()
            );
        }
        MonitorEvent::Closed { summary }
    }

    /// Current state for an intervention.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            recent_output: self
                .log
                .iter()
                .rev()
                .take(SNAPSHOT_TAIL)
                .rev()
                .map(|l| l.text.clone())
                .collect(),
            unanswered_questions: self.activity.unanswered_questions(),
            current_activity: self.activity.current(),
            recent_progress: self.activity.recent_markers(SNAPSHOT_MARKERS),
        }
    }

    #[must_use]
    pub fn buffer(&self, channel: OutputChannel) -> &RingBuffer<String> {
        match channel {
            OutputChannel::Stdout => &self.stdout,
            OutputChannel::Stderr => &self.stderr,
        }
    }

    /// Every line seen, in arrival order.
    #[must_use]
    pub fn log(&self) -> &[LogLine] {
        &self.log
    }

    #[must_use]
    pub fn current_activity(&self) -> Option<ActivityKind> {
        self.activity.current()
    }

    #[must_use]
    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    #[must_use]
    pub fn lines_processed(&self) -> usize {
        self.lines_processed
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn splitter(&mut self, channel: OutputChannel) -> &mut LineSplitter {
        match channel {
            OutputChannel::Stdout => &mut self.stdout_split,
            OutputChannel::Stderr => &mut self.stderr_split,
        }
    }
}

impl Default for StreamMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// Read `source` until EOF or cancellation, forwarding chunks to `tx`.
///
/// Sends [`OutputChunk::Eof`] when the source ends or fails. Cancellation
/// drops the reader without sending anything further.
pub fn spawn_reader<R>(
    channel: OutputChannel,
    mut source: R,
    tx: mpsc::Sender<OutputChunk>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Reader for {} cancelled", channel);
                    return;
                }
                read = source.read(&mut buf) => read,
            };
            match read {
                Ok(0) => break,
                Ok(n) => {
                    if tx
                        .send(OutputChunk::Data(channel, buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Reading {} failed: {}", channel, e);
                    break;
                }
            }
        }
        let _ = tx.send(OutputChunk::Eof(channel)).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::IssueCategory;

    fn interventions(events: &[MonitorEvent]) -> Vec<(IssueCategory, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::InterventionRequired { issues, line, .. } => {
                    primary_issue(issues).map(|i| (i.category, line.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ingest_splits_and_buffers() {
        let mut monitor = StreamMonitor::new(1000);
        monitor.ingest(OutputChannel::Stdout, "Starting session...\nCreat");
        assert_eq!(monitor.lines_processed(), 1);

        let events = monitor.ingest(OutputChannel::Stdout, "ing src/app.js\n");
        assert_eq!(monitor.lines_processed(), 2);
        assert!(matches!(
            events.as_slice(),
            [MonitorEvent::Progress { marker }] if marker.kind == ActivityKind::FileCreation
        ));
        assert_eq!(monitor.buffer(OutputChannel::Stdout).len(), 2);
        assert_eq!(monitor.current_activity(), Some(ActivityKind::FileCreation));
    }

    #[test]
    fn test_channels_are_buffered_separately() {
        let mut monitor = StreamMonitor::new(2);
        monitor.ingest(OutputChannel::Stdout, "a\nb\nc\n");
        monitor.ingest(OutputChannel::Stderr, "x\n");

        assert_eq!(monitor.buffer(OutputChannel::Stdout).len(), 2);
        assert_eq!(monitor.buffer(OutputChannel::Stderr).len(), 1);
        assert_eq!(monitor.log().len(), 4);
        assert_eq!(monitor.log()[3].channel, OutputChannel::Stderr);
    }

    #[test]
    fn test_intervention_carries_snapshot() {
        let mut monitor = StreamMonitor::default();
        monitor.ingest(OutputChannel::Stdout, "Creating src/app.js\n");
        let events = monitor.ingest(
            OutputChannel::Stdout,
            "May I create the following files: a, b, c?\n",
        );

        let Some(MonitorEvent::InterventionRequired { snapshot, line, .. }) = events.last() else {
            panic!("expected intervention, got {events:?}");
        };
        assert_eq!(line, "May I create the following files: a, b, c?");
        assert_eq!(snapshot.recent_output.len(), 2);
        assert_eq!(snapshot.unanswered_questions, vec![line.clone()]);
        assert_eq!(snapshot.current_activity, Some(ActivityKind::FileCreation));
        assert_eq!(snapshot.recent_progress.len(), 1);
    }

    #[test]
    fn test_scenario_interventions() {
        let mut monitor = StreamMonitor::default();
        let mut events = Vec::new();
        for line in [
            "Starting session...",
            "Could you please clarify what requirements you mean?",
            "Creating src/app.js",
            "May I create the following files: a, b, c?",
            "Implementation completed successfully!",
        ] {
            events.extend(monitor.process_line(OutputChannel::Stdout, line));
        }

        let found = interventions(&events);
        let categories: Vec<_> = found.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            categories,
            vec![IssueCategory::Confusion, IssueCategory::Permission]
        );
        assert_eq!(monitor.current_activity(), Some(ActivityKind::Completion));
    }

    #[test]
    fn test_close_reports_unresolved() {
        let mut monitor = StreamMonitor::default();
        monitor.ingest(OutputChannel::Stdout, "Should I proceed?\n");
        monitor.ingest(OutputChannel::Stderr, "error: boom\n");
        monitor.ingest(OutputChannel::Stdout, "Creating lib.rs");
        monitor.resolve("error: boom");

        let MonitorEvent::Closed { summary } = monitor.close(Some(ExitInfo {
            code: Some(0),
            signal: None,
        })) else {
            panic!("expected summary");
        };
        assert_eq!(summary.unresolved_questions, vec!["Should I proceed?"]);
        assert_eq!(summary.unaddressed_interventions, vec!["Should I proceed?"]);
        assert_eq!(summary.last_activity, Some(ActivityKind::FileCreation));
        assert_eq!(summary.lines_processed, 3);
        assert!(summary.exit.unwrap().success());

        assert!(monitor.ingest(OutputChannel::Stdout, "more\n").is_empty());
        assert!(monitor.is_closed());
    }

    #[test]
    fn test_flush_all_reports_trailing_markers() {
        let mut monitor = StreamMonitor::default();
        monitor.ingest(OutputChannel::Stdout, "Implementation completed successfully!");
        monitor.ingest(OutputChannel::Stderr, "Should I proceed?");

        let events = monitor.flush_all();
        assert!(matches!(
            events.first(),
            Some(MonitorEvent::Progress { marker }) if marker.kind == ActivityKind::Completion
        ));
        assert_eq!(interventions(&events).len(), 1);
        assert_eq!(monitor.lines_processed(), 2);
        assert!(monitor.flush_all().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_reader_forwards_until_eof() {
        let (tx, mut rx) = mpsc::channel(16);
        let source = std::io::Cursor::new(b"line one\nline two\n".to_vec());
        let handle = spawn_reader(OutputChannel::Stdout, source, tx, CancellationToken::new());

        let mut monitor = StreamMonitor::default();
        while let Some(chunk) = rx.recv().await {
            match chunk {
                OutputChunk::Data(channel, bytes) => {
                    monitor.ingest(channel, bytes);
                }
                OutputChunk::Eof(channel) => {
                    monitor.flush(channel);
                    break;
                }
            }
        }
        handle.await.unwrap();
        assert_eq!(monitor.lines_processed(), 2);
    }

    #[tokio::test]
    async fn test_spawn_reader_stops_on_cancel() {
        let (tx, mut rx) = mpsc::channel(16);
        let (_writer, reader) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let handle = spawn_reader(OutputChannel::Stderr, reader, tx, cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
