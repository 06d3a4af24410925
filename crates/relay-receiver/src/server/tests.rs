//! Receiver HTTP behavior exercised through a live listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use relay_core::{
    AppRegistration, AppRegistry, Event, EventBus, EventBusError, EventList, EventSelector,
    ListOptions, ObjectMeta, SourceState,
};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{build_receiver_router, ReceiverState};
use crate::signature::{compute_request_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const SECRET: &str = "weather-secret";
const TIMESTAMP: &str = "1700000000";

#[derive(Default)]
struct ScriptedBus {
    projects: Vec<String>,
    fail_create: bool,
    created: Mutex<Vec<Event>>,
}

#[async_trait]
impl EventBus for ScriptedBus {
    async fn list(
        &self,
        _selector: &EventSelector,
        _options: &ListOptions,
    ) -> Result<EventList, EventBusError> {
        Ok(EventList::default())
    }

    async fn create(&self, event: &Event) -> Result<EventList, EventBusError> {
        self.created.lock().await.push(event.clone());
        if self.fail_create {
            return Err(EventBusError::Transport {
                operation: "create",
                message: "connection refused".to_string(),
            });
        }
        let items = self
            .projects
            .iter()
            .enumerate()
            .map(|(index, project_id)| Event {
                metadata: ObjectMeta {
                    id: format!("evt-{index}"),
                    created: None,
                },
                project_id: project_id.clone(),
                ..event.clone()
            })
            .collect();
        Ok(EventList {
            items,
            ..EventList::default()
        })
    }

    async fn update_source_state(
        &self,
        _event_id: &str,
        _state: &SourceState,
    ) -> Result<(), EventBusError> {
        Ok(())
    }
}

async fn spawn_receiver(bus: Arc<ScriptedBus>) -> (SocketAddr, JoinHandle<()>) {
    let registry = AppRegistry::from_registrations(vec![AppRegistration {
        app_id: "42".to_string(),
        signing_secret: SECRET.to_string(),
        api_token: "xoxb-42".to_string(),
    }])
    .expect("registry");
    let state = Arc::new(ReceiverState::new(Arc::new(registry), bus));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_receiver_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    (addr, handle)
}

async fn post_signed(addr: SocketAddr, body: &'static str, signature: &str) -> reqwest::Response {
    Client::new()
        .post(format!("http://{addr}/slash-commands"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .expect("send slash command")
}

const WEATHER_BODY: &str =
    "team_id=T1&channel_id=C0WEATHER&user_id=U1&command=%2Fweather&text=berlin&api_app_id=42";

#[tokio::test]
async fn integration_signed_command_without_subscribers_acknowledges_in_channel() {
    let bus = Arc::new(ScriptedBus::default());
    let (addr, handle) = spawn_receiver(bus.clone()).await;
    let signature =
        compute_request_signature(SECRET, TIMESTAMP, WEATHER_BODY.as_bytes()).expect("signature");

    let response = post_signed(addr, WEATHER_BODY, signature.as_str()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        Some("application/json")
    );
    let body = response.text().await.expect("body");
    assert!(body.contains("no subscribers"));
    assert!(body.contains("C0WEATHER"));

    let created = bus.created.lock().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].event_type, "weather");
    assert_eq!(created[0].app_id(), Some("42"));
    assert_eq!(created[0].payload, "berlin");
    handle.abort();
}

#[tokio::test]
async fn functional_fan_out_lists_each_project_and_event() {
    let bus = Arc::new(ScriptedBus {
        projects: vec!["italian".to_string(), "thai".to_string()],
        ..ScriptedBus::default()
    });
    let (addr, handle) = spawn_receiver(bus).await;
    let signature =
        compute_request_signature(SECRET, TIMESTAMP, WEATHER_BODY.as_bytes()).expect("signature");

    let response = post_signed(addr, WEATHER_BODY, signature.as_str()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let decoded: Value = response.json().await.expect("json");
    assert_eq!(decoded["blocks"][2]["fields"][0]["text"], "italian");
    assert_eq!(decoded["blocks"][2]["fields"][1]["text"], "evt-0");
    assert_eq!(decoded["blocks"][3]["fields"][0]["text"], "thai");
    assert_eq!(decoded["blocks"][3]["fields"][1]["text"], "evt-1");
    handle.abort();
}

#[tokio::test]
async fn regression_forged_signature_is_forbidden_before_create() {
    let bus = Arc::new(ScriptedBus::default());
    let (addr, handle) = spawn_receiver(bus.clone()).await;
    let forged =
        compute_request_signature("other", TIMESTAMP, WEATHER_BODY.as_bytes()).expect("signature");

    let response = post_signed(addr, WEATHER_BODY, forged.as_str()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.text().await.expect("body").is_empty());
    assert!(bus.created.lock().await.is_empty());
    handle.abort();
}

#[tokio::test]
async fn regression_empty_body_and_unknown_app_are_forbidden() {
    let bus = Arc::new(ScriptedBus::default());
    let (addr, handle) = spawn_receiver(bus.clone()).await;
    let empty_signature = compute_request_signature(SECRET, TIMESTAMP, b"").expect("signature");
    let response = post_signed(addr, "", empty_signature.as_str()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let unknown_body = "command=%2Fweather&api_app_id=99&channel_id=C1";
    let signature =
        compute_request_signature(SECRET, TIMESTAMP, unknown_body.as_bytes()).expect("signature");
    let response = post_signed(addr, unknown_body, signature.as_str()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(bus.created.lock().await.is_empty());
    handle.abort();
}

#[tokio::test]
async fn functional_create_failure_returns_internal_server_error() {
    let bus = Arc::new(ScriptedBus {
        fail_create: true,
        ..ScriptedBus::default()
    });
    let (addr, handle) = spawn_receiver(bus).await;
    let signature =
        compute_request_signature(SECRET, TIMESTAMP, WEATHER_BODY.as_bytes()).expect("signature");

    let response = post_signed(addr, WEATHER_BODY, signature.as_str()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let decoded: Value = response.json().await.expect("json");
    assert_eq!(decoded, json!({"status": "internal server error"}));
    handle.abort();
}

#[tokio::test]
async fn unit_healthz_needs_no_signature() {
    let (addr, handle) = spawn_receiver(Arc::new(ScriptedBus::default())).await;
    let response = Client::new()
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .expect("send health");
    assert_eq!(response.status(), StatusCode::OK);
    let decoded: Value = response.json().await.expect("json");
    assert_eq!(decoded["status"], "ok");
    handle.abort();
}
