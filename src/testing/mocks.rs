//! Test doubles for response delivery.
//!
//! Both mocks are cheap to clone; clones share their state so a test can
//! keep one copy while the session owns the other.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{OverseerError, Result};
use crate::session::{DeliveryAdapter, DeliveryCapability};

/// One response captured by [`RecordingDelivery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredResponse {
    pub text: String,
    pub at: Instant,
}

/// Delivery adapter that records every response it is given.
///
/// # Example
///
/// ```rust,ignore
/// let delivery = RecordingDelivery::new();
/// let handle = supervisor.attach(None, sources, Box::new(delivery.clone()));
/// handle.wait().await?;
/// assert_eq!(delivery.texts().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RecordingDelivery {
    capability: DeliveryCapability,
    delivered: Arc<Mutex<Vec<DeliveredResponse>>>,
}

impl Default for RecordingDelivery {
    fn default() -> Self {
        Self {
            capability: DeliveryCapability::DirectInput,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RecordingDelivery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a different capability.
    #[must_use]
    pub fn with_capability(mut self, capability: DeliveryCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Everything delivered so far, in order.
    pub fn delivered(&self) -> Vec<DeliveredResponse> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.delivered().into_iter().map(|d| d.text).collect()
    }
}

#[async_trait]
impl DeliveryAdapter for RecordingDelivery {
    fn capability(&self) -> DeliveryCapability {
        self.capability
    }

    async fn deliver(&mut self, text: &str) -> Result<()> {
        let response = DeliveredResponse {
            text: text.to_string(),
            at: Instant::now(),
        };
        self.delivered
            .lock()
            .map_err(|_| OverseerError::delivery("recording lock poisoned"))?
            .push(response);
        Ok(())
    }
}

/// Delivery adapter whose every delivery fails.
#[derive(Debug, Clone, Default)]
pub struct FailingDelivery {
    attempts: Arc<AtomicU32>,
}

impl FailingDelivery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deliveries attempted.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryAdapter for FailingDelivery {
    fn capability(&self) -> DeliveryCapability {
        DeliveryCapability::DirectInput
    }

    async fn deliver(&mut self, _text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(OverseerError::delivery("input channel closed"))
    }
}
