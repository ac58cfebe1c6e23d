//! Response delivery to the monitored session.
//!
//! A session either owns the monitored process and writes responses to its
//! input ([`StdinDelivery`]), or only observes it and surfaces each response
//! as an event for an external input adapter ([`EmitOnlyDelivery`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::events::{EventKind, EventSink};
use crate::error::{OverseerError, Result};

/// What a delivery adapter can do with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryCapability {
    /// Writes straight into the monitored session's input
    DirectInput,
    /// Emits the response as an event
    EmitOnly,
}

impl DeliveryCapability {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectInput => "direct-input",
            Self::EmitOnly => "emit-only",
        }
    }
}

impl std::fmt::Display for DeliveryCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sends response text to the monitored session.
#[async_trait]
pub trait DeliveryAdapter: Send {
    fn capability(&self) -> DeliveryCapability;

    /// Deliver one response.
    ///
    /// # Errors
    ///
    /// Returns [`OverseerError::Delivery`] when the response could not be
    /// handed over. The session keeps running.
    async fn deliver(&mut self, text: &str) -> Result<()>;
}

/// Writes each response, newline-terminated, to an input stream.
pub struct StdinDelivery<W> {
    writer: W,
}

impl<W> StdinDelivery<W>
where
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> DeliveryAdapter for StdinDelivery<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn capability(&self) -> DeliveryCapability {
        DeliveryCapability::DirectInput
    }

    async fn deliver(&mut self, text: &str) -> Result<()> {
        let mut payload = text.trim_end().to_string();
        payload.push('\n');
        self.writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| OverseerError::delivery(format!("write to monitored input: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| OverseerError::delivery(format!("flush monitored input: {e}")))
    }
}

/// Emits each response as a `responseReady` event.
#[derive(Debug, Clone)]
pub struct EmitOnlyDelivery {
    events: EventSink,
}

impl EmitOnlyDelivery {
    #[must_use]
    pub fn new(events: EventSink) -> Self {
        Self { events }
    }
}

#[async_trait]
impl DeliveryAdapter for EmitOnlyDelivery {
    fn capability(&self) -> DeliveryCapability {
        DeliveryCapability::EmitOnly
    }

    async fn deliver(&mut self, text: &str) -> Result<()> {
        self.events.emit(EventKind::ResponseReady {
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_stdin_delivery_writes_lines() {
        let (writer, mut reader) = tokio::io::duplex(256);
        let mut delivery = StdinDelivery::new(writer);
        assert_eq!(delivery.capability(), DeliveryCapability::DirectInput);

        delivery.deliver("Yes, please proceed.").await.unwrap();
        delivery.deliver("Second\n").await.unwrap();
        drop(delivery);

        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "Yes, please proceed.\nSecond\n");
    }

    #[tokio::test]
    async fn test_stdin_delivery_reports_closed_pipe() {
        let (writer, reader) = tokio::io::duplex(8);
        drop(reader);
        let mut delivery = StdinDelivery::new(writer);
        let err = delivery.deliver("hello").await.unwrap_err();
        assert!(matches!(err, OverseerError::Delivery { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_emit_only_delivery_emits_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut delivery = EmitOnlyDelivery::new(EventSink::new("s", tx));
        assert_eq!(delivery.capability(), DeliveryCapability::EmitOnly);

        delivery.deliver("Yes, go ahead.").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.kind,
            EventKind::ResponseReady {
                text: "Yes, go ahead.".into()
            }
        );
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(DeliveryCapability::DirectInput.to_string(), "direct-input");
        assert_eq!(
            serde_json::to_string(&DeliveryCapability::EmitOnly).unwrap(),
            "\"emit-only\""
        );
    }
}
