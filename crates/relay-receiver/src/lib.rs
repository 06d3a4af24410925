//! Inbound half of the relay: verifies signed Slack slash-command webhooks,
//! turns them into engine events, and answers with an acknowledgment.

mod ack;
mod server;
mod signature;
mod slash_command;
mod translator;

pub use ack::{acknowledgment_message, render_acknowledgment};
pub use server::{
    build_receiver_router, run_receiver, ReceiverConfig, ReceiverState, DEFAULT_RECEIVER_BIND,
    HEALTHZ_PATH, SLASH_COMMANDS_PATH,
};
pub use signature::{
    compute_request_signature, AuthenticationFailure, SignatureVerifier, SignedRequest,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use slash_command::{form_value, SlashCommand};
pub use translator::{event_type_for_command, CommandTranslator, TranslateError};
