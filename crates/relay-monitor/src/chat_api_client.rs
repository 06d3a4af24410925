//! Retrying client for Slack's `chat.postMessage`.

use std::time::Duration;

use relay_core::SlackMessage;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::chat_retry::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    RETRY_ATTEMPT_HEADER,
};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const POST_MESSAGE_METHOD: &str = "chat.postMessage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatApiClientConfig {
    pub api_base: String,
    pub request_timeout_ms: u64,
    /// Total attempts per message, including the first.
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for ChatApiClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            request_timeout_ms: 10_000,
            retry_max_attempts: 4,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatDeliveryError {
    #[error("failed to create chat api client")]
    Build(#[source] reqwest::Error),
    #[error("failed to encode chat message")]
    Encode(#[from] serde_json::Error),
    #[error("chat api request failed after {attempts} attempt(s)")]
    Transport {
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Final HTTP response of a post once retries are spent.
pub struct ChatPostOutcome {
    pub status: u16,
    pub attempts: usize,
    /// Slack's `error` field when it answered `{"ok": false}`.
    pub slack_error: Option<String>,
}

impl ChatPostOutcome {
    pub fn is_delivered(&self) -> bool {
        self.status == 200
    }
}

#[derive(Clone)]
pub struct ChatApiClient {
    http: reqwest::Client,
    post_message_url: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl ChatApiClient {
    pub fn new(config: &ChatApiClientConfig) -> Result<Self, ChatDeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("slack-relay"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(ChatDeliveryError::Build)?;
        Ok(Self {
            http,
            post_message_url: format!(
                "{}/{POST_MESSAGE_METHOD}",
                config.api_base.trim_end_matches('/')
            ),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    /// Posts `message` with `token` as bearer credentials. Throttling, 5xx and
    /// transient transport failures are retried with backoff; any other
    /// status is returned as-is for the caller to judge.
    pub async fn post_message(
        &self,
        token: &str,
        message: &SlackMessage,
    ) -> Result<ChatPostOutcome, ChatDeliveryError> {
        let body = message.to_json_vec()?;
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self
                .http
                .post(self.post_message_url.as_str())
                .bearer_auth(token)
                .header(CONTENT_TYPE, "application/json; charset=utf-8")
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .body(body.clone())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if attempt < self.retry_max_attempts && is_retryable_status(status) {
                        let delay = retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            parse_retry_after(response.headers()),
                        );
                        debug!(
                            status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying chat.postMessage"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let slack_error = response
                        .json::<Value>()
                        .await
                        .ok()
                        .and_then(|payload| slack_error_code(&payload));
                    return Ok(ChatPostOutcome {
                        status,
                        attempts: attempt,
                        slack_error,
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(ChatDeliveryError::Transport {
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }
}

fn slack_error_code(payload: &Value) -> Option<String> {
    if payload.get("ok").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    Some(
        payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string(),
    )
}
