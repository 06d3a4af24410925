//! Foundational types shared by the Slack relay receiver and monitor.
//!
//! Provides the immutable Slack app registry, the engine event model, the
//! event-bus trait seams, and the typed Block Kit message builder.

pub mod app_registry;
pub mod event;
pub mod event_bus;
pub mod slack_blocks;

pub use app_registry::{
    load_app_registry, parse_app_registry, AppRegistration, AppRegistry, AppRegistryError,
};
pub use event::{
    Event, EventList, EventSelector, ListOptions, ObjectMeta, SourceState, Worker, WorkerPhase,
    WorkerStatus, APP_ID_QUALIFIER, LABEL_CHANNEL_ID, LABEL_ENTERPRISE_ID, LABEL_TEAM_ID,
    LABEL_USER_ID, SLACK_EVENT_SOURCE, TRACKING_STATE_KEY, TRACKING_STATE_VALUE,
};
pub use event_bus::{EventBus, EventBusError, HealthProbe};
pub use slack_blocks::{Block, SlackMessage, TextObject};
