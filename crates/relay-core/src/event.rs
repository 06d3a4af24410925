//! Engine event model, in the engine's JSON field layout.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source namespace for every event this relay emits and monitors.
pub const SLACK_EVENT_SOURCE: &str = "brigade.sh/slack";
pub const APP_ID_QUALIFIER: &str = "appID";
pub const LABEL_TEAM_ID: &str = "teamID";
pub const LABEL_CHANNEL_ID: &str = "channelID";
pub const LABEL_USER_ID: &str = "userID";
pub const LABEL_ENTERPRISE_ID: &str = "enterpriseID";
pub const TRACKING_STATE_KEY: &str = "tracking";
pub const TRACKING_STATE_VALUE: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Lifecycle phase of the worker handling an event.
pub enum WorkerPhase {
    Pending,
    Starting,
    Running,
    Aborted,
    Canceled,
    Failed,
    SchedulingFailed,
    Succeeded,
    TimedOut,
    #[serde(other)]
    Unknown,
}

impl WorkerPhase {
    pub const TERMINAL: [WorkerPhase; 6] = [
        Self::Aborted,
        Self::Canceled,
        Self::Failed,
        Self::SchedulingFailed,
        Self::Succeeded,
        Self::TimedOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Aborted => "ABORTED",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::SchedulingFailed => "SCHEDULING_FAILED",
            Self::Succeeded => "SUCCEEDED",
            Self::TimedOut => "TIMED_OUT",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Key-value annotation the relay uses as its completion flag.
pub struct SourceState {
    #[serde(default)]
    pub state: BTreeMap<String, String>,
}

impl SourceState {
    /// State marking an event as awaiting a status report.
    pub fn tracking() -> Self {
        Self {
            state: BTreeMap::from([(
                TRACKING_STATE_KEY.to_string(),
                TRACKING_STATE_VALUE.to_string(),
            )]),
        }
    }

    /// Empty state; writing it back marks the event as reported.
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.state.get(TRACKING_STATE_KEY).map(String::as_str) == Some(TRACKING_STATE_VALUE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub phase: WorkerPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub status: WorkerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// An engine event. Ids and project ids are assigned by the engine.
pub struct Event {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(rename = "projectID", default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(
        rename = "sourceState",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_state: Option<SourceState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payload: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<Worker>,
}

impl Event {
    pub fn id(&self) -> &str {
        self.metadata.id.as_str()
    }

    /// App id qualifier; an empty value counts as absent.
    pub fn app_id(&self) -> Option<&str> {
        self.qualifiers
            .get(APP_ID_QUALIFIER)
            .map(String::as_str)
            .filter(|app_id| !app_id.is_empty())
    }

    pub fn channel_id(&self) -> &str {
        self.labels
            .get(LABEL_CHANNEL_ID)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn worker_phase(&self) -> WorkerPhase {
        self.worker
            .as_ref()
            .map(|worker| worker.status.phase)
            .unwrap_or(WorkerPhase::Unknown)
    }

    pub fn summary(&self) -> Option<&str> {
        Some(self.summary.as_str()).filter(|summary| !summary.is_empty())
    }

    pub fn is_tracked(&self) -> bool {
        self.source_state
            .as_ref()
            .is_some_and(SourceState::is_tracking)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Filter applied when listing events.
pub struct EventSelector {
    pub source: String,
    pub worker_phases: Vec<WorkerPhase>,
    pub source_state: BTreeMap<String, String>,
}

impl EventSelector {
    /// Relay events whose worker finished and which still await a report.
    pub fn tracked_terminal() -> Self {
        Self {
            source: SLACK_EVENT_SOURCE.to_string(),
            worker_phases: WorkerPhase::TERMINAL.to_vec(),
            source_state: SourceState::tracking().state,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: u32,
    pub continue_token: Option<String>,
}

impl ListOptions {
    pub fn first_page(limit: u32) -> Self {
        Self {
            limit,
            continue_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// One page of events plus the cursor needed to fetch the next.
pub struct EventList {
    pub items: Vec<Event>,
    pub continue_token: Option<String>,
    pub remaining_item_count: u64,
}
