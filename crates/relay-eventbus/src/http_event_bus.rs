//! Engine v2 events API client over reqwest.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    Event, EventBus, EventBusError, EventList, EventSelector, HealthProbe, ListOptions,
    SourceState,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ENGINE_API_VERSION: &str = "brigade.sh/v2";
const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Clone)]
/// Connection settings for the engine API.
pub struct HttpEventBusConfig {
    pub address: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub allow_insecure_connections: bool,
}

impl fmt::Debug for HttpEventBusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEventBusConfig")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("allow_insecure_connections", &self.allow_insecure_connections)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListMetaWire {
    #[serde(default, rename = "continue")]
    continue_token: String,
    #[serde(default, rename = "remainingItemCount")]
    remaining_item_count: u64,
}

#[derive(Debug, Deserialize)]
struct EventListWire {
    #[serde(default)]
    metadata: ListMetaWire,
    #[serde(default)]
    items: Vec<Event>,
}

impl From<EventListWire> for EventList {
    fn from(wire: EventListWire) -> Self {
        Self {
            items: wire.items,
            continue_token: Some(wire.metadata.continue_token).filter(|token| !token.is_empty()),
            remaining_item_count: wire.metadata.remaining_item_count,
        }
    }
}

#[derive(Serialize)]
struct VersionedBody<'a, T: Serialize> {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Clone)]
pub struct HttpEventBusClient {
    http: reqwest::Client,
    address: String,
    token: String,
}

impl HttpEventBusClient {
    pub fn new(config: HttpEventBusConfig) -> Result<Self, EventBusError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("slack-relay"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .danger_accept_invalid_certs(config.allow_insecure_connections)
            .build()
            .map_err(|error| EventBusError::Transport {
                operation: "client setup",
                message: error.to_string(),
            })?;
        Ok(Self {
            http,
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
        })
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, EventBusError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|error| EventBusError::Transport {
                operation,
                message: error.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EventBusError::Status {
            operation,
            status: status.as_u16(),
            body: truncate_body(&body, ERROR_BODY_MAX_CHARS),
        })
    }

    /// `{address}/v2/events/{event_id}/source-state` with the id escaped as
    /// a single path segment.
    fn source_state_url(&self, event_id: &str) -> Result<reqwest::Url, EventBusError> {
        let invalid_address = |message: String| EventBusError::Transport {
            operation: "update source state",
            message,
        };
        let mut url = reqwest::Url::parse(&self.address)
            .map_err(|error| invalid_address(format!("invalid engine address: {error}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                invalid_address(format!("engine address {} cannot be a base", self.address))
            })?
            .pop_if_empty()
            .extend(["v2", "events", event_id, "source-state"]);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, EventBusError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|error| EventBusError::Decode {
                operation,
                message: error.to_string(),
            })
    }
}

fn list_query(selector: &EventSelector, options: &ListOptions) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if !selector.source.is_empty() {
        query.push(("source", selector.source.clone()));
    }
    if !selector.worker_phases.is_empty() {
        let phases = selector
            .worker_phases
            .iter()
            .map(|phase| phase.as_str())
            .collect::<Vec<_>>()
            .join(",");
        query.push(("workerPhases", phases));
    }
    if !selector.source_state.is_empty() {
        let state = selector
            .source_state
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        query.push(("sourceState", state));
    }
    if options.limit > 0 {
        query.push(("limit", options.limit.to_string()));
    }
    if let Some(token) = options
        .continue_token
        .as_deref()
        .filter(|token| !token.is_empty())
    {
        query.push(("continue", token.to_string()));
    }
    query
}

fn truncate_body(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[async_trait]
impl EventBus for HttpEventBusClient {
    async fn list(
        &self,
        selector: &EventSelector,
        options: &ListOptions,
    ) -> Result<EventList, EventBusError> {
        let query = list_query(selector, options);
        debug!(
            source = %selector.source,
            continue_token = options.continue_token.as_deref().unwrap_or(""),
            "listing engine events"
        );
        let wire: EventListWire = self
            .send_json(
                "list events",
                self.http
                    .get(format!("{}/v2/events", self.address))
                    .query(&query),
            )
            .await?;
        Ok(wire.into())
    }

    async fn create(&self, event: &Event) -> Result<EventList, EventBusError> {
        let body = VersionedBody {
            api_version: ENGINE_API_VERSION,
            kind: "Event",
            body: event,
        };
        let wire: EventListWire = self
            .send_json(
                "create event",
                self.http
                    .post(format!("{}/v2/events", self.address))
                    .json(&body),
            )
            .await?;
        Ok(wire.into())
    }

    async fn update_source_state(
        &self,
        event_id: &str,
        state: &SourceState,
    ) -> Result<(), EventBusError> {
        let body = VersionedBody {
            api_version: ENGINE_API_VERSION,
            kind: "SourceState",
            body: state,
        };
        let url = self.source_state_url(event_id)?;
        self.send("update source state", self.http.put(url).json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for HttpEventBusClient {
    async fn ping(&self) -> Result<(), EventBusError> {
        self.send("ping", self.http.get(format!("{}/v2/ping", self.address)))
            .await?;
        Ok(())
    }
}
