//! Axum receiver for signed Slack slash commands plus a health endpoint.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::{AppRegistry, EventBus};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::signature::{SignatureVerifier, SignedRequest, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::slash_command::{form_value, SlashCommand, FIELD_API_APP_ID};
use crate::translator::CommandTranslator;

pub const SLASH_COMMANDS_PATH: &str = "/slash-commands";
pub const HEALTHZ_PATH: &str = "/healthz";
pub const DEFAULT_RECEIVER_BIND: &str = "0.0.0.0:8080";
const MAX_SLASH_COMMAND_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub bind: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_RECEIVER_BIND.to_string(),
        }
    }
}

#[derive(Clone)]
/// Shared, read-only state behind every receiver request.
pub struct ReceiverState {
    verifier: SignatureVerifier,
    translator: CommandTranslator,
}

impl ReceiverState {
    pub fn new(registry: Arc<AppRegistry>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            verifier: SignatureVerifier::new(registry),
            translator: CommandTranslator::new(bus),
        }
    }
}

pub fn build_receiver_router(state: Arc<ReceiverState>) -> Router {
    Router::new()
        .route(SLASH_COMMANDS_PATH, post(handle_slash_command))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_slack_signature,
        ))
        .route(HEALTHZ_PATH, get(handle_health))
        .with_state(state)
}

/// Serves the receiver until `shutdown` resolves.
pub async fn run_receiver<F>(
    config: &ReceiverConfig,
    state: Arc<ReceiverState>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve receiver bound address")?;
    info!(addr = %local_addr, "slash command receiver listening");

    axum::serve(listener, build_receiver_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("slash command receiver exited unexpectedly")?;
    info!("slash command receiver stopped");
    Ok(())
}

/// Rejects requests whose Slack signature does not verify. The body is read
/// in full and handed on unchanged; an unreadable body is treated as empty.
async fn verify_slack_signature(
    State(state): State<Arc<ReceiverState>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_SLASH_COMMAND_BODY_BYTES)
        .await
        .unwrap_or_default();
    let app_id = form_value(&body, FIELD_API_APP_ID).unwrap_or_default();
    let signed = SignedRequest {
        body: &body,
        timestamp: header_str(&parts.headers, TIMESTAMP_HEADER),
        signature: header_str(&parts.headers, SIGNATURE_HEADER),
        app_id: app_id.as_str(),
    };
    if let Err(failure) = state.verifier.verify(&signed) {
        warn!(app_id = %failure.app_id(), reason = %failure, "rejected slash command request");
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(Request::from_parts(parts, Body::from(body))).await
}

async fn handle_slash_command(State(state): State<Arc<ReceiverState>>, body: Bytes) -> Response {
    let command = SlashCommand::from_form_body(&body);
    match state.translator.handle(&command).await {
        Ok(acknowledgment) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            acknowledgment,
        )
            .into_response(),
        Err(failure) => {
            error!(
                app_id = %command.api_app_id,
                command = %command.command,
                error = ?failure,
                "failed to handle slash command"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "internal server error"})),
            )
                .into_response()
        }
    }
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
