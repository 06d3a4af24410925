//! Status monitor: finds finished relay events and reports them to Slack.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{
    AppRegistry, Event, EventBus, EventBusError, EventSelector, ListOptions, SourceState,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::chat_api_client::{ChatApiClient, ChatDeliveryError};
use crate::status_message::status_message;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_LIST_EVENTS_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub list_events_interval: Duration,
    pub healthcheck_interval: Duration,
    pub page_size: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            list_events_interval: DEFAULT_LIST_EVENTS_INTERVAL,
            healthcheck_interval: DEFAULT_HEALTHCHECK_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.list_events_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "list events interval must be greater than zero".to_string(),
            ));
        }
        if self.healthcheck_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "healthcheck interval must be greater than zero".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
/// Failures that stop the monitor service.
pub enum MonitorError {
    #[error("invalid monitor configuration: {0}")]
    InvalidConfig(String),
    #[error("error listing events")]
    ListEvents(#[source] EventBusError),
    #[error("engine health check failed")]
    EngineUnhealthy(#[source] EventBusError),
}

#[derive(Debug, Error)]
/// Why one event's status was not reported. The event stays tracked and is
/// retried on the next cycle.
pub enum ReportStatusError {
    #[error("no slack app id found in event '{event_id}' qualifiers")]
    MissingAppId { event_id: String },
    #[error("no configuration found for app '{app_id}' of event '{event_id}'")]
    UnknownApp { event_id: String, app_id: String },
    #[error("failed to render status message for event '{event_id}'")]
    Render {
        event_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to send status message for event '{event_id}' of app '{app_id}'")]
    Delivery {
        event_id: String,
        app_id: String,
        #[source]
        source: ChatDeliveryError,
    },
    #[error("chat api answered status {status} for event '{event_id}' of app '{app_id}'")]
    Rejected {
        event_id: String,
        app_id: String,
        status: u16,
    },
    #[error("status for event '{event_id}' was delivered but clearing its source state failed")]
    ClearSourceState {
        event_id: String,
        #[source]
        source: EventBusError,
    },
}

impl ReportStatusError {
    /// True when retrying cannot succeed until the event or registry changes.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::MissingAppId { .. } | Self::UnknownApp { .. })
    }

    pub fn event_id(&self) -> &str {
        match self {
            Self::MissingAppId { event_id }
            | Self::UnknownApp { event_id, .. }
            | Self::Render { event_id, .. }
            | Self::Delivery { event_id, .. }
            | Self::Rejected { event_id, .. }
            | Self::ClearSourceState { event_id, .. } => event_id.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCycleReport {
    pub pages: usize,
    pub listed: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Shutdown was requested before the cycle finished.
    pub interrupted: bool,
}

/// Resolves once shutdown is requested or the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub struct StatusMonitor {
    bus: Arc<dyn EventBus>,
    registry: Arc<AppRegistry>,
    chat: ChatApiClient,
    config: MonitorConfig,
}

impl StatusMonitor {
    pub fn new(
        bus: Arc<dyn EventBus>,
        registry: Arc<AppRegistry>,
        chat: ChatApiClient,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            bus,
            registry,
            chat,
            config,
        })
    }

    /// Polls once immediately and then on every interval tick until shutdown.
    /// Returns an error only when listing events fails.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), MonitorError> {
        let mut ticker = tokio::time::interval(self.config.list_events_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            let report = self.poll_cycle(&mut shutdown).await?;
            if report.listed > 0 {
                info!(
                    pages = report.pages,
                    listed = report.listed,
                    delivered = report.delivered,
                    failed = report.failed,
                    "status monitor cycle complete"
                );
            }
            if report.interrupted {
                break;
            }
        }
        debug!("status monitor stopped");
        Ok(())
    }

    /// Walks every page of tracked terminal events and reports each one.
    pub async fn poll_cycle(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PollCycleReport, MonitorError> {
        let selector = EventSelector::tracked_terminal();
        let mut options = ListOptions::first_page(self.config.page_size);
        let mut report = PollCycleReport::default();
        loop {
            let page = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    report.interrupted = true;
                    return Ok(report);
                }
                page = self.bus.list(&selector, &options) => page.map_err(MonitorError::ListEvents)?,
            };
            report.pages += 1;
            report.listed += page.items.len();

            for event in &page.items {
                let outcome = tokio::select! {
                    biased;
                    _ = shutdown_requested(shutdown) => {
                        report.interrupted = true;
                        return Ok(report);
                    }
                    outcome = self.report_status(event) => outcome,
                };
                match outcome {
                    Ok(()) => report.delivered += 1,
                    Err(failure) => {
                        report.failed += 1;
                        log_report_failure(&failure);
                    }
                }
            }

            if page.remaining_item_count == 0 {
                break;
            }
            match page.continue_token.filter(|token| !token.is_empty()) {
                Some(token) => options.continue_token = Some(token),
                None => {
                    warn!(
                        remaining = page.remaining_item_count,
                        "event page reported remaining items without a continuation token"
                    );
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Posts `event`'s status to its channel and, once Slack answers 200,
    /// clears the event's source state so it is not reported again.
    pub async fn report_status(&self, event: &Event) -> Result<(), ReportStatusError> {
        let event_id = event.id();
        let Some(app_id) = event.app_id() else {
            return Err(ReportStatusError::MissingAppId {
                event_id: event_id.to_string(),
            });
        };
        let Some(app) = self.registry.get(app_id) else {
            return Err(ReportStatusError::UnknownApp {
                event_id: event_id.to_string(),
                app_id: app_id.to_string(),
            });
        };

        let message = status_message(event);
        let outcome = self
            .chat
            .post_message(app.api_token.as_str(), &message)
            .await
            .map_err(|source| match source {
                ChatDeliveryError::Encode(source) => ReportStatusError::Render {
                    event_id: event_id.to_string(),
                    source,
                },
                source => ReportStatusError::Delivery {
                    event_id: event_id.to_string(),
                    app_id: app_id.to_string(),
                    source,
                },
            })?;
        if !outcome.is_delivered() {
            return Err(ReportStatusError::Rejected {
                event_id: event_id.to_string(),
                app_id: app_id.to_string(),
                status: outcome.status,
            });
        }
        if let Some(slack_error) = outcome.slack_error.as_deref() {
            warn!(
                event_id,
                app_id,
                slack_error,
                "slack reported an error for a delivered status message"
            );
        }

        self.bus
            .update_source_state(event_id, &SourceState::cleared())
            .await
            .map_err(|source| ReportStatusError::ClearSourceState {
                event_id: event_id.to_string(),
                source,
            })?;
        debug!(event_id, app_id, attempts = outcome.attempts, "reported event status");
        Ok(())
    }
}

fn log_report_failure(failure: &ReportStatusError) {
    if failure.is_permanent() {
        warn!(event_id = failure.event_id(), error = %failure, "cannot report event status");
    } else {
        error!(event_id = failure.event_id(), error = ?failure, "failed to report event status");
    }
}
