use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::{load_app_registry, AppRegistry};
use relay_eventbus::{HttpEventBusClient, HttpEventBusConfig};
use relay_monitor::{
    run_monitor_service, ChatApiClient, ChatApiClientConfig, MonitorConfig, StatusMonitor,
    DEFAULT_PAGE_SIZE,
};
use relay_receiver::{run_receiver, ReceiverConfig, ReceiverState};
use tracing::info;

use crate::bootstrap::shutdown_signal;
use crate::cli_args::{Cli, CliCommand, EngineArgs, MonitorArgs, ReceiverArgs};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        CliCommand::Receiver(args) => run_receiver_command(args).await,
        CliCommand::Monitor(args) => run_monitor_command(args).await,
    }
}

async fn run_receiver_command(args: ReceiverArgs) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = "receiver",
        "starting slack relay"
    );
    let registry = load_registry(&args.engine.slack_apps_path)?;
    let bus = Arc::new(build_event_bus(&args.engine)?);
    let state = Arc::new(ReceiverState::new(registry, bus));
    let config = ReceiverConfig { bind: args.bind };
    run_receiver(&config, state, async {
        let reason = shutdown_signal().await;
        info!(reason = %reason, "stopping slash command receiver");
    })
    .await
}

async fn run_monitor_command(args: MonitorArgs) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = "monitor",
        "starting slack relay"
    );
    let registry = load_registry(&args.engine.slack_apps_path)?;
    let bus = Arc::new(build_event_bus(&args.engine)?);
    let chat = ChatApiClient::new(&ChatApiClientConfig {
        api_base: args.slack_api_base.clone(),
        request_timeout_ms: args.slack_request_timeout_ms,
        retry_max_attempts: args.slack_retry_max_attempts,
        retry_base_delay_ms: args.slack_retry_base_delay_ms,
    })
    .context("failed to create slack chat api client")?;
    let config = monitor_config(&args);
    let monitor = StatusMonitor::new(bus.clone(), registry, chat, config.clone())
        .context("invalid monitor configuration")?;

    let exit = run_monitor_service(
        Arc::new(monitor),
        bus,
        config.healthcheck_interval,
        Duration::from_millis(args.shutdown_grace_ms),
        shutdown_signal(),
    )
    .await;
    let reason = exit.into_result().context("monitor service stopped")?;
    info!(reason = %reason, "monitor service stopped");
    Ok(())
}

fn monitor_config(args: &MonitorArgs) -> MonitorConfig {
    MonitorConfig {
        list_events_interval: Duration::from_millis(args.list_events_interval_ms),
        healthcheck_interval: Duration::from_millis(args.healthcheck_interval_ms),
        page_size: DEFAULT_PAGE_SIZE,
    }
}

fn load_registry(path: &Path) -> Result<Arc<AppRegistry>> {
    let registry = load_app_registry(path)
        .with_context(|| format!("failed to load slack app registry from {}", path.display()))?;
    info!(
        path = %path.display(),
        apps = registry.len(),
        "loaded slack app registry"
    );
    Ok(Arc::new(registry))
}

fn build_event_bus(args: &EngineArgs) -> Result<HttpEventBusClient> {
    HttpEventBusClient::new(HttpEventBusConfig {
        address: args.api_address.clone(),
        token: args.api_token.clone(),
        request_timeout_ms: args.api_request_timeout_ms,
        allow_insecure_connections: args.api_ignore_cert_warnings,
    })
    .context("failed to create event engine client")
}
