//! Periodic engine ping; an unhealthy engine stops the service.

use std::sync::Arc;
use std::time::Duration;

use relay_core::HealthProbe;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::monitor::{shutdown_requested, MonitorError};

/// Pings the engine now and then every `interval` until shutdown. The first
/// failed ping ends the loop with [`MonitorError::EngineUnhealthy`].
pub async fn run_healthcheck_loop(
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), MonitorError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => break,
            pinged = probe.ping() => pinged.map_err(MonitorError::EngineUnhealthy)?,
        }
        debug!("engine health check passed");
    }
    Ok(())
}
