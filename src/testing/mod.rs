//! Testing infrastructure for Overseer.
//!
//! - **Mocks**: delivery adapters that record or fail, usable from
//!   integration tests
//! - **Fixtures**: temporary project directories (test-only)
//!
//! # Example
//!
//! ```rust,ignore
//! use overseer::testing::{RecordingDelivery, TestFixture};
//!
//! let fixture = TestFixture::react_project();
//! let delivery = RecordingDelivery::new();
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod mocks;

#[cfg(test)]
pub use fixtures::*;
pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextProvider, ProjectType};
    use crate::session::{DeliveryAdapter, DeliveryCapability};

    // =========================================================================
    // Mock Delivery Tests
    // =========================================================================

    #[tokio::test]
    async fn test_recording_delivery_shares_log_between_clones() {
        let recorder = RecordingDelivery::new();
        let mut boxed: Box<dyn DeliveryAdapter> = Box::new(recorder.clone());

        boxed.deliver("first").await.unwrap();
        boxed.deliver("second").await.unwrap();

        assert_eq!(recorder.texts(), vec!["first", "second"]);
        let delivered = recorder.delivered();
        assert!(delivered[1].at >= delivered[0].at);
    }

    #[test]
    fn test_recording_delivery_capability() {
        let recorder = RecordingDelivery::new().with_capability(DeliveryCapability::EmitOnly);
        assert_eq!(recorder.capability(), DeliveryCapability::EmitOnly);
        assert_eq!(
            RecordingDelivery::default().capability(),
            DeliveryCapability::DirectInput
        );
    }

    #[tokio::test]
    async fn test_failing_delivery_counts_attempts() {
        let failing = FailingDelivery::new();
        let mut adapter = failing.clone();
        assert!(adapter.deliver("x").await.is_err());
        assert!(adapter.deliver("y").await.is_err());
        assert_eq!(failing.attempts(), 2);
    }

    // =========================================================================
    // Fixture Tests
    // =========================================================================

    #[test]
    fn test_fixture_with_requirements() {
        let fixture = TestFixture::with_requirements();
        assert!(fixture.file_exists("PRD.md"));
        assert!(fixture.read("PRD.md").contains("Users can add todos"));
        assert!(!fixture.file_exists("CLAUDE.md"));
    }

    #[test]
    fn test_react_fixture_feeds_context_provider() {
        let fixture = TestFixture::react_project();
        let mut provider = ContextProvider::new(fixture.path());
        let context = provider.initialize(None);

        assert!(context.has_tests);
        assert!(context.has_component_dir);
        assert!(context.has_lint_config);
        assert!(context.frameworks.contains("react"));
        assert_ne!(context.project_type, ProjectType::Unknown);
        assert_eq!(context.requirements.len(), 3);
        assert!(fixture.file_exists("CLAUDE.md"));
    }
}
