//! # Event Relay
//!
//! Dispatches inbound platform events to their handlers. Each handler is
//! registered under its `(platform, event)` pair; events without a handler
//! are acknowledged and dropped so new platform events never break delivery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::events::WebhookEnvelope;
use crate::models::Platform;
use crate::outbound::{ClientError, OutboundClient};
use crate::repositories::{StatusStore, StoreError};

pub mod submission;
pub mod templates;
pub mod workflow;

pub use submission::{SubmissionCompletedHandler, SubmissionOpenedHandler};
pub use templates::TemplateMap;
pub use workflow::WorkflowCompletedHandler;

pub const SUBMISSION_COMPLETED: &str = "submission.completed";
pub const SUBMISSION_OPENED: &str = "submission.opened";
pub const WORKFLOW_COMPLETED: &str = "workflow.completed";

/// Errors a handler can return to the webhook receiver.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid '{event}' payload: {source}")]
    InvalidPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Outbound(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RelayError {
    /// Whether the failure lies with the delivered payload rather than with a
    /// dependency. Such deliveries are acknowledged, not failed.
    pub fn is_invalid_payload(&self) -> bool {
        matches!(self, RelayError::InvalidPayload { .. })
    }
}

/// Deserialises an event's `data` into its typed payload.
pub(crate) fn parse_payload<T: DeserializeOwned>(
    event: &'static str,
    data: JsonValue,
) -> Result<T, RelayError> {
    serde_json::from_value(data).map_err(|source| RelayError::InvalidPayload { event, source })
}

/// Shared collaborators handed to every handler.
#[derive(Clone)]
pub struct RelayContext {
    pub outbound: Arc<dyn OutboundClient>,
    pub documents: Arc<dyn StatusStore>,
    pub templates: TemplateMap,
}

/// Handles one kind of platform event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &RelayContext, data: JsonValue) -> Result<(), RelayError>;
}

/// `(platform, event)` → handler lookup table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(Platform, String), Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every handler this service ships.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            Platform::Docuseal,
            SUBMISSION_COMPLETED,
            Arc::new(SubmissionCompletedHandler),
        );
        registry.register(
            Platform::Docuseal,
            SUBMISSION_OPENED,
            Arc::new(SubmissionOpenedHandler),
        );
        registry.register(
            Platform::N8n,
            WORKFLOW_COMPLETED,
            Arc::new(WorkflowCompletedHandler),
        );
        registry
    }

    /// Registers a handler, replacing any previous one for the same pair.
    pub fn register(
        &mut self,
        platform: Platform,
        event: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) {
        self.handlers.insert((platform, event.into()), handler);
    }

    pub fn get(&self, platform: Platform, event: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(&(platform, event.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// What the relay did with a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Ignored,
}

impl Dispatch {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dispatch::Handled => "handled",
            Dispatch::Ignored => "ignored",
        }
    }
}

/// Registry plus context: everything needed to process a delivery.
#[derive(Clone)]
pub struct Relay {
    registry: HandlerRegistry,
    ctx: RelayContext,
}

impl Relay {
    pub fn new(registry: HandlerRegistry, ctx: RelayContext) -> Self {
        Self { registry, ctx }
    }

    pub fn context(&self) -> &RelayContext {
        &self.ctx
    }

    /// Runs the handler registered for the envelope's event, if any.
    pub async fn dispatch(
        &self,
        platform: Platform,
        envelope: WebhookEnvelope,
    ) -> Result<Dispatch, RelayError> {
        let Some(handler) = self.registry.get(platform, &envelope.event) else {
            info!(%platform, event = %envelope.event, "No handler for event; ignoring");
            return Ok(Dispatch::Ignored);
        };

        debug!(%platform, event = %envelope.event, "Dispatching event");
        handler.handle(&self.ctx, envelope.data).await?;
        Ok(Dispatch::Handled)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeOutbound, FakeStore, context};
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(AtomicUsize);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _ctx: &RelayContext, _data: JsonValue) -> Result<(), RelayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn envelope(event: &str, data: JsonValue) -> WebhookEnvelope {
        WebhookEnvelope {
            event: event.to_string(),
            data,
        }
    }

    #[test]
    fn test_standard_registry_covers_known_events() {
        let registry = HandlerRegistry::standard();
        assert_eq!(registry.len(), 3);
        assert!(registry.get(Platform::Docuseal, SUBMISSION_COMPLETED).is_some());
        assert!(registry.get(Platform::Docuseal, SUBMISSION_OPENED).is_some());
        assert!(registry.get(Platform::N8n, WORKFLOW_COMPLETED).is_some());
        // Events are scoped to the platform that emits them
        assert!(registry.get(Platform::N8n, SUBMISSION_COMPLETED).is_none());
        assert!(registry.get(Platform::Docuseal, WORKFLOW_COMPLETED).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_invokes_exactly_the_registered_handler() {
        let completed = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let opened = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let mut registry = HandlerRegistry::new();
        registry.register(Platform::Docuseal, SUBMISSION_COMPLETED, completed.clone());
        registry.register(Platform::Docuseal, SUBMISSION_OPENED, opened.clone());

        let outbound = Arc::new(FakeOutbound::default());
        let store = Arc::new(FakeStore::default());
        let relay = Relay::new(registry, context(outbound, store));

        let outcome = relay
            .dispatch(Platform::Docuseal, envelope(SUBMISSION_COMPLETED, json!({})))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(completed.0.load(Ordering::SeqCst), 1);
        assert_eq!(opened.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored_without_side_effects() {
        let outbound = Arc::new(FakeOutbound::default());
        let store = Arc::new(FakeStore::default().with_document("D1", "pending"));
        let relay = Relay::new(
            HandlerRegistry::standard(),
            context(outbound.clone(), store.clone()),
        );

        let outcome = relay
            .dispatch(
                Platform::Docuseal,
                envelope("submission.archived", json!({"id": 1})),
            )
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Ignored);
        assert!(outbound.fetches.lock().unwrap().is_empty());
        assert!(outbound.triggers().is_empty());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_invalid_payload_classification() {
        let err = parse_payload::<crate::events::SubmissionEvent>(SUBMISSION_OPENED, json!({}))
            .unwrap_err();
        assert!(err.is_invalid_payload());
        assert!(err.to_string().starts_with("invalid 'submission.opened' payload"));

        let err = RelayError::from(StoreError::NotFound {
            document_id: "D9".to_string(),
        });
        assert!(!err.is_invalid_payload());
        assert_eq!(err.to_string(), "document 'D9' not found");
    }
}
