//! Outbound half of the relay: watches the engine for finished Slack events,
//! posts their status back to the originating channel, and supervises the
//! long-running loops that do so.

mod chat_api_client;
mod chat_retry;
mod healthcheck;
mod monitor;
mod service;
mod status_message;
mod supervisor;

pub use chat_api_client::{
    ChatApiClient, ChatApiClientConfig, ChatDeliveryError, ChatPostOutcome,
    DEFAULT_SLACK_API_BASE,
};
pub use healthcheck::run_healthcheck_loop;
pub use monitor::{
    MonitorConfig, MonitorError, PollCycleReport, ReportStatusError, StatusMonitor,
    DEFAULT_HEALTHCHECK_INTERVAL, DEFAULT_LIST_EVENTS_INTERVAL, DEFAULT_PAGE_SIZE,
};
pub use service::{monitor_units, run_monitor_service, HEALTHCHECK_UNIT, STATUS_MONITOR_UNIT};
pub use status_message::status_message;
pub use supervisor::{
    SupervisedUnit, Supervisor, SupervisorExit, UnitError, UnitFailure, DEFAULT_SHUTDOWN_GRACE,
};
