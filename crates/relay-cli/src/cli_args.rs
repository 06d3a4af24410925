use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "relay",
    version,
    about = "Relays Slack slash commands into the event engine and reports event status back to Slack"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Serve the signed slash-command webhook.
    Receiver(ReceiverArgs),
    /// Report finished events back to their Slack channels.
    Monitor(MonitorArgs),
}

/// Engine connection and app registry flags shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct EngineArgs {
    #[arg(
        long = "api-address",
        env = "RELAY_API_ADDRESS",
        help = "Base URL of the event engine API"
    )]
    pub api_address: String,

    #[arg(
        long = "api-token",
        env = "RELAY_API_TOKEN",
        hide_env_values = true,
        help = "Bearer token for the event engine API"
    )]
    pub api_token: String,

    #[arg(
        long = "api-ignore-cert-warnings",
        env = "RELAY_API_IGNORE_CERT_WARNINGS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Accept invalid TLS certificates from the event engine API"
    )]
    pub api_ignore_cert_warnings: bool,

    #[arg(
        long = "api-request-timeout-ms",
        env = "RELAY_API_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout in milliseconds for event engine API requests"
    )]
    pub api_request_timeout_ms: u64,

    #[arg(
        long = "slack-apps-path",
        env = "RELAY_SLACK_APPS_PATH",
        help = "Path to the JSON array of Slack app registrations"
    )]
    pub slack_apps_path: PathBuf,
}

#[derive(Debug, Args)]
pub(crate) struct ReceiverArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(
        long = "bind",
        env = "RELAY_RECEIVER_BIND",
        default_value = "0.0.0.0:8080",
        help = "Socket address the slash-command webhook listens on"
    )]
    pub bind: String,
}

#[derive(Debug, Args)]
pub(crate) struct MonitorArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(
        long = "list-events-interval-ms",
        env = "RELAY_LIST_EVENTS_INTERVAL_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Interval in milliseconds between scans for finished events"
    )]
    pub list_events_interval_ms: u64,

    #[arg(
        long = "healthcheck-interval-ms",
        env = "RELAY_HEALTHCHECK_INTERVAL_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Interval in milliseconds between event engine health checks"
    )]
    pub healthcheck_interval_ms: u64,

    #[arg(
        long = "slack-api-base",
        env = "RELAY_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "slack-request-timeout-ms",
        env = "RELAY_SLACK_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout in milliseconds for Slack Web API requests"
    )]
    pub slack_request_timeout_ms: u64,

    #[arg(
        long = "slack-retry-max-attempts",
        env = "RELAY_SLACK_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable slack api failures (429/5xx/transport)"
    )]
    pub slack_retry_max_attempts: usize,

    #[arg(
        long = "slack-retry-base-delay-ms",
        env = "RELAY_SLACK_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff delay in milliseconds for slack api retries"
    )]
    pub slack_retry_base_delay_ms: u64,

    #[arg(
        long = "shutdown-grace-ms",
        env = "RELAY_SHUTDOWN_GRACE_MS",
        default_value_t = 3_000,
        value_parser = parse_positive_u64,
        help = "How long to wait in milliseconds for monitor loops to stop on shutdown"
    )]
    pub shutdown_grace_ms: u64,
}
