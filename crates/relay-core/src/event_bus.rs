//! Trait seams for the engine's event bus and health endpoint.

use async_trait::async_trait;
use thiserror::Error;

use crate::event::{Event, EventList, EventSelector, ListOptions, SourceState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Failures talking to the engine.
pub enum EventBusError {
    #[error("event bus {operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("event bus {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode event bus {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

#[async_trait]
/// Event operations the relay consumes from the engine.
pub trait EventBus: Send + Sync {
    /// Lists one page of events matching `selector`.
    async fn list(
        &self,
        selector: &EventSelector,
        options: &ListOptions,
    ) -> Result<EventList, EventBusError>;

    /// Creates `event`; the engine fans it out to every subscribed project
    /// and returns one event per project.
    async fn create(&self, event: &Event) -> Result<EventList, EventBusError>;

    async fn update_source_state(
        &self,
        event_id: &str,
        state: &SourceState,
    ) -> Result<(), EventBusError>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), EventBusError>;
}
