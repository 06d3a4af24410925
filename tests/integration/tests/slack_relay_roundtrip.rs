use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use relay_core::{AppRegistration, AppRegistry, SLACK_EVENT_SOURCE};
use relay_eventbus::{HttpEventBusClient, HttpEventBusConfig};
use relay_monitor::{
    ChatApiClient, ChatApiClientConfig, MonitorConfig, ReportStatusError, StatusMonitor,
};
use relay_receiver::{
    build_receiver_router, compute_request_signature, ReceiverState, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;

fn registry() -> Arc<AppRegistry> {
    Arc::new(
        AppRegistry::from_registrations(vec![AppRegistration {
            app_id: "42".to_string(),
            signing_secret: "weather-signing-secret".to_string(),
            api_token: "xoxb-weather".to_string(),
        }])
        .expect("registry"),
    )
}

fn engine_client(engine: &MockServer) -> Arc<HttpEventBusClient> {
    Arc::new(
        HttpEventBusClient::new(HttpEventBusConfig {
            address: engine.base_url(),
            token: "engine-token".to_string(),
            request_timeout_ms: 2_000,
            allow_insecure_connections: false,
        })
        .expect("engine client"),
    )
}

fn status_monitor(engine: &MockServer, slack: &MockServer) -> StatusMonitor {
    let chat = ChatApiClient::new(&ChatApiClientConfig {
        api_base: slack.base_url(),
        request_timeout_ms: 2_000,
        retry_max_attempts: 2,
        retry_base_delay_ms: 1,
    })
    .expect("chat client");
    StatusMonitor::new(
        engine_client(engine),
        registry(),
        chat,
        MonitorConfig::default(),
    )
    .expect("monitor")
}

fn finished_event(id: &str, qualifiers: Value) -> Value {
    json!({
        "metadata": {"id": id},
        "projectID": "weather-reports",
        "source": SLACK_EVENT_SOURCE,
        "type": "weather",
        "qualifiers": qualifiers,
        "labels": {"channelID": "C0WEATHER", "teamID": "T1", "userID": "U1"},
        "sourceState": {"state": {"tracking": "true"}},
        "summary": "sunny with a chance of rain",
        "worker": {"status": {"phase": "SUCCEEDED"}}
    })
}

#[tokio::test]
async fn integration_signed_weather_command_without_subscribers_is_acknowledged() {
    let engine = MockServer::start();
    let create = engine.mock(|when, then| {
        when.method(POST)
            .path("/v2/events")
            .header("authorization", "Bearer engine-token")
            .json_body_includes(
                json!({
                    "apiVersion": "brigade.sh/v2",
                    "kind": "Event",
                    "source": SLACK_EVENT_SOURCE,
                    "type": "weather",
                    "qualifiers": {"appID": "42"},
                    "sourceState": {"state": {"tracking": "true"}}
                })
                .to_string(),
            );
        then.status(201).json_body(json!({"metadata": {}, "items": []}));
    });

    let state = Arc::new(ReceiverState::new(registry(), engine_client(&engine)));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_receiver_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(25)).await;

    let body = "team_id=T1&channel_id=C0WEATHER&user_id=U1&command=%2Fweather&text=berlin&api_app_id=42";
    let timestamp = "1718000000";
    let signature =
        compute_request_signature("weather-signing-secret", timestamp, body.as_bytes())
            .expect("signature");
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/slash-commands"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .expect("send slash command");

    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.expect("body");
    assert!(text.contains("no subscribers"));
    assert!(text.contains("C0WEATHER"));
    create.assert();
    handle.abort();
}

#[tokio::test]
async fn integration_event_without_app_id_is_left_tracked_and_not_posted() {
    let engine = MockServer::start();
    let slack = MockServer::start();
    let list = engine.mock(|when, then| {
        when.method(GET)
            .path("/v2/events")
            .query_param("source", SLACK_EVENT_SOURCE)
            .query_param("limit", "100");
        then.status(200).json_body(json!({
            "metadata": {"remainingItemCount": 0},
            "items": [finished_event("evt-orphan", json!({}))]
        }));
    });
    let clear = engine.mock(|when, then| {
        when.method(PUT).path("/v2/events/evt-orphan/source-state");
        then.status(200);
    });
    let post = slack.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200).json_body(json!({"ok": true}));
    });

    let monitor = status_monitor(&engine, &slack);
    let (_shutdown_tx, mut shutdown) = watch::channel(false);
    let report = monitor.poll_cycle(&mut shutdown).await.expect("cycle");
    assert_eq!(report.listed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 0);

    let event = serde_json::from_value(finished_event("evt-orphan", json!({}))).expect("event");
    let failure = monitor
        .report_status(&event)
        .await
        .expect_err("missing app id");
    assert!(matches!(failure, ReportStatusError::MissingAppId { .. }));
    assert!(failure.is_permanent());

    list.assert_calls(1);
    clear.assert_calls(0);
    post.assert_calls(0);
}

#[tokio::test]
async fn integration_finished_event_is_posted_then_cleared() {
    let engine = MockServer::start();
    let slack = MockServer::start();
    let list = engine.mock(|when, then| {
        when.method(GET).path("/v2/events");
        then.status(200).json_body(json!({
            "metadata": {"remainingItemCount": 0},
            "items": [finished_event("evt-1", json!({"appID": "42"}))]
        }));
    });
    let clear = engine.mock(|when, then| {
        when.method(PUT)
            .path("/v2/events/evt-1/source-state")
            .json_body(json!({"apiVersion": "brigade.sh/v2", "kind": "SourceState", "state": {}}));
        then.status(200);
    });
    let post = slack.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .header("authorization", "Bearer xoxb-weather")
            .body_includes("Event Status Update")
            .body_includes("sunny with a chance of rain")
            .json_body_includes(json!({"channel": "C0WEATHER"}).to_string());
        then.status(200).json_body(json!({"ok": true}));
    });

    let monitor = status_monitor(&engine, &slack);
    let (_shutdown_tx, mut shutdown) = watch::channel(false);
    let report = monitor.poll_cycle(&mut shutdown).await.expect("cycle");
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 0);

    list.assert_calls(1);
    post.assert_calls(1);
    clear.assert_calls(1);
}
