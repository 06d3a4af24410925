//! Slash command to engine event translation.

use std::sync::Arc;

use relay_core::{
    Event, EventBus, EventBusError, SourceState, APP_ID_QUALIFIER, LABEL_CHANNEL_ID,
    LABEL_ENTERPRISE_ID, LABEL_TEAM_ID, LABEL_USER_ID, SLACK_EVENT_SOURCE,
};
use thiserror::Error;
use tracing::info;

use crate::ack::render_acknowledgment;
use crate::slash_command::SlashCommand;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid slash command: {0}")]
    Validation(String),
    #[error("failed to create '{event_type}' event for app '{app_id}'")]
    Create {
        event_type: String,
        app_id: String,
        #[source]
        source: EventBusError,
    },
}

/// Event type for a command: exactly one leading `/` is stripped.
pub fn event_type_for_command(command: &str) -> &str {
    command.strip_prefix('/').unwrap_or(command)
}

#[derive(Clone)]
pub struct CommandTranslator {
    bus: Arc<dyn EventBus>,
}

impl CommandTranslator {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    pub fn build_event(&self, command: &SlashCommand) -> Result<Event, TranslateError> {
        let event_type = event_type_for_command(command.command.as_str());
        if event_type.is_empty() {
            return Err(TranslateError::Validation(format!(
                "command '{}' does not name an event type",
                command.command
            )));
        }
        let mut event = Event {
            source: SLACK_EVENT_SOURCE.to_string(),
            event_type: event_type.to_string(),
            source_state: Some(SourceState::tracking()),
            payload: command.text.clone(),
            ..Event::default()
        };
        event
            .qualifiers
            .insert(APP_ID_QUALIFIER.to_string(), command.api_app_id.clone());
        event
            .labels
            .insert(LABEL_TEAM_ID.to_string(), command.team_id.clone());
        event
            .labels
            .insert(LABEL_CHANNEL_ID.to_string(), command.channel_id.clone());
        event
            .labels
            .insert(LABEL_USER_ID.to_string(), command.user_id.clone());
        if let Some(enterprise_id) = command.enterprise_id() {
            event
                .labels
                .insert(LABEL_ENTERPRISE_ID.to_string(), enterprise_id.to_string());
        }
        Ok(event)
    }

    /// Creates the event and renders the acknowledgment body. Any failure
    /// fails the whole request.
    pub async fn handle(&self, command: &SlashCommand) -> Result<Vec<u8>, TranslateError> {
        let event = self.build_event(command)?;
        let created = self
            .bus
            .create(&event)
            .await
            .map_err(|source| TranslateError::Create {
                event_type: event.event_type.clone(),
                app_id: command.api_app_id.clone(),
                source,
            })?;
        info!(
            event_type = %event.event_type,
            app_id = %command.api_app_id,
            created = created.items.len(),
            "created slash command events"
        );
        render_acknowledgment(command.channel_id.as_str(), &created.items)
            .map_err(|error| TranslateError::Validation(format!("render acknowledgment: {error}")))
    }
}
