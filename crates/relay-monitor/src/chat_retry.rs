//! Backoff and `Retry-After` handling for chat API delivery.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Request header carrying the zero-based retry attempt.
pub(crate) const RETRY_ATTEMPT_HEADER: &str = "x-relay-retry-attempt";
const MAX_BACKOFF_EXPONENT: u32 = 6;
/// Upper bound on a server-requested wait so one throttled post cannot stall a cycle.
pub(crate) const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// `Retry-After` as a delay, accepting delta-seconds or an HTTP-date.
/// Dates already in the past yield a zero delay; delays are capped at
/// [`MAX_RETRY_AFTER`].
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    parse_retry_after_value(headers).map(|delay| delay.min(MAX_RETRY_AFTER))
}

fn parse_retry_after_value(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();
    Some(Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0)))
}

pub(crate) fn retry_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after: Option<Duration>,
) -> Duration {
    if let Some(retry_after) = retry_after {
        return retry_after;
    }
    let exponent = u32::try_from(attempt.saturating_sub(1))
        .unwrap_or(MAX_BACKOFF_EXPONENT)
        .min(MAX_BACKOFF_EXPONENT);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(2_u64.pow(exponent)))
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}
