//! Slack request signature verification.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use relay_core::AppRegistry;
use sha2::Sha256;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationFailure {
    #[error("request body is missing or unreadable")]
    MissingBody,
    #[error("no signing secret registered for app '{app_id}'")]
    UnknownApp { app_id: String },
    #[error("signature header for app '{app_id}' is malformed")]
    MalformedSignature { app_id: String },
    #[error("signature mismatch for app '{app_id}'")]
    SignatureMismatch { app_id: String },
}

impl AuthenticationFailure {
    pub fn app_id(&self) -> &str {
        match self {
            Self::MissingBody => "",
            Self::UnknownApp { app_id }
            | Self::MalformedSignature { app_id }
            | Self::SignatureMismatch { app_id } => app_id.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
/// The parts of an inbound request that take part in signing.
pub struct SignedRequest<'a> {
    pub body: &'a [u8],
    pub timestamp: &'a str,
    pub signature: &'a str,
    pub app_id: &'a str,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    registry: Arc<AppRegistry>,
}

impl SignatureVerifier {
    pub fn new(registry: Arc<AppRegistry>) -> Self {
        Self { registry }
    }

    /// Recomputes `v0=HMAC-SHA256(secret, "v0:{timestamp}:{body}")` and checks
    /// it against the supplied signature in constant time.
    pub fn verify(&self, request: &SignedRequest<'_>) -> Result<(), AuthenticationFailure> {
        if request.body.is_empty() {
            return Err(AuthenticationFailure::MissingBody);
        }
        let Some(secret) = self.registry.signing_secret(request.app_id) else {
            return Err(AuthenticationFailure::UnknownApp {
                app_id: request.app_id.to_string(),
            });
        };
        let malformed = || AuthenticationFailure::MalformedSignature {
            app_id: request.app_id.to_string(),
        };
        let digest_hex = request
            .signature
            .trim()
            .strip_prefix("v0=")
            .ok_or_else(malformed)?;
        let provided = decode_hex(digest_hex).ok_or_else(malformed)?;
        let mac = signing_mac(secret, request.timestamp, request.body).ok_or_else(malformed)?;
        mac.verify_slice(&provided)
            .map_err(|_| AuthenticationFailure::SignatureMismatch {
                app_id: request.app_id.to_string(),
            })
    }
}

/// Signature Slack would send for `body` at `timestamp` under `secret`.
pub fn compute_request_signature(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mac = signing_mac(secret, timestamp, body)?;
    let digest = mac.finalize().into_bytes();
    Some(format!(
        "{SIGNATURE_VERSION}={}",
        digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>()
    ))
}

fn signing_mac(secret: &str, timestamp: &str, body: &[u8]) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(mac)
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() % 2 != 0
        || !trimmed.bytes().all(|byte| byte.is_ascii_hexdigit())
    {
        return None;
    }
    trimmed
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let chunk = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(chunk, 16).ok()
        })
        .collect()
}
