//! Wires the status monitor and healthcheck into a supervised service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use relay_core::HealthProbe;

use crate::healthcheck::run_healthcheck_loop;
use crate::monitor::StatusMonitor;
use crate::supervisor::{SupervisedUnit, Supervisor, SupervisorExit};

pub const STATUS_MONITOR_UNIT: &str = "status monitor";
pub const HEALTHCHECK_UNIT: &str = "engine healthcheck";

/// The monitor service's two long-lived units.
pub fn monitor_units(
    monitor: Arc<StatusMonitor>,
    probe: Arc<dyn HealthProbe>,
    healthcheck_interval: Duration,
) -> Vec<SupervisedUnit> {
    vec![
        SupervisedUnit::new(STATUS_MONITOR_UNIT, move |shutdown| async move {
            monitor.run(shutdown).await
        }),
        SupervisedUnit::new(HEALTHCHECK_UNIT, move |shutdown| {
            run_healthcheck_loop(probe, healthcheck_interval, shutdown)
        }),
    ]
}

/// Runs the status monitor and healthcheck under a [`Supervisor`] until one
/// fails or `cancel` resolves.
pub async fn run_monitor_service<C>(
    monitor: Arc<StatusMonitor>,
    probe: Arc<dyn HealthProbe>,
    healthcheck_interval: Duration,
    grace: Duration,
    cancel: C,
) -> SupervisorExit
where
    C: Future<Output = String>,
{
    Supervisor::new(grace)
        .run(monitor_units(monitor, probe, healthcheck_interval), cancel)
        .await
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use relay_core::{
        AppRegistry, Event, EventBus, EventBusError, EventList, EventSelector, HealthProbe,
        ListOptions, SourceState,
    };
    use tokio::sync::Mutex;

    use super::{run_monitor_service, HEALTHCHECK_UNIT, STATUS_MONITOR_UNIT};
    use crate::chat_api_client::{ChatApiClient, ChatApiClientConfig};
    use crate::monitor::{MonitorConfig, MonitorError, StatusMonitor};
    use crate::supervisor::UnitError;

    struct Engine {
        healthy: bool,
        pages: Mutex<VecDeque<Result<EventList, EventBusError>>>,
    }

    #[async_trait]
    impl EventBus for Engine {
        async fn list(
            &self,
            _selector: &EventSelector,
            _options: &ListOptions,
        ) -> Result<EventList, EventBusError> {
            self.pages
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(EventList::default()))
        }

        async fn create(&self, _event: &Event) -> Result<EventList, EventBusError> {
            Ok(EventList::default())
        }

        async fn update_source_state(
            &self,
            _event_id: &str,
            _state: &SourceState,
        ) -> Result<(), EventBusError> {
            Ok(())
        }
    }

    #[async_trait]
    impl HealthProbe for Engine {
        async fn ping(&self) -> Result<(), EventBusError> {
            if self.healthy {
                return Ok(());
            }
            Err(EventBusError::Status {
                operation: "ping",
                status: 503,
                body: String::new(),
            })
        }
    }

    fn status_monitor(engine: Arc<Engine>) -> Arc<StatusMonitor> {
        let chat = ChatApiClient::new(&ChatApiClientConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..ChatApiClientConfig::default()
        })
        .expect("chat client");
        Arc::new(
            StatusMonitor::new(
                engine,
                Arc::new(AppRegistry::default()),
                chat,
                MonitorConfig {
                    list_events_interval: Duration::from_millis(20),
                    ..MonitorConfig::default()
                },
            )
            .expect("monitor"),
        )
    }

    #[tokio::test]
    async fn integration_listing_failure_shuts_down_the_service() {
        let engine = Arc::new(Engine {
            healthy: true,
            pages: Mutex::new(VecDeque::from([Err(EventBusError::Transport {
                operation: "list",
                message: "connection refused".to_string(),
            })])),
        });
        let exit = run_monitor_service(
            status_monitor(engine.clone()),
            engine,
            Duration::from_secs(60),
            Duration::from_secs(3),
            std::future::pending::<String>(),
        )
        .await;
        let failure = exit.into_result().expect_err("listing failure");
        assert_eq!(failure.unit, STATUS_MONITOR_UNIT);
        assert!(matches!(
            failure.error,
            UnitError::Monitor(MonitorError::ListEvents(_))
        ));
    }

    #[tokio::test]
    async fn integration_unhealthy_engine_shuts_down_the_service() {
        let engine = Arc::new(Engine {
            healthy: false,
            pages: Mutex::new(VecDeque::new()),
        });
        let exit = run_monitor_service(
            status_monitor(engine.clone()),
            engine,
            Duration::from_secs(60),
            Duration::from_secs(3),
            std::future::pending::<String>(),
        )
        .await;
        let failure = exit.into_result().expect_err("unhealthy");
        assert_eq!(failure.unit, HEALTHCHECK_UNIT);
    }

    #[tokio::test]
    async fn functional_cancellation_returns_reason() {
        let engine = Arc::new(Engine {
            healthy: true,
            pages: Mutex::new(VecDeque::new()),
        });
        let exit = run_monitor_service(
            status_monitor(engine.clone()),
            engine,
            Duration::from_secs(60),
            Duration::from_secs(3),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "received SIGINT".to_string()
            },
        )
        .await;
        assert_eq!(exit.into_result().expect("cancelled"), "received SIGINT");
    }
}
