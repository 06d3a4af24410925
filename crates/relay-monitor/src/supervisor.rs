//! Runs the monitor's long-lived units side by side and owns their shutdown.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::monitor::MonitorError;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

type UnitResult = Result<(), MonitorError>;
type UnitOutcome = (&'static str, Result<UnitResult, Box<dyn Any + Send>>);
type UnitStart = Box<dyn FnOnce(watch::Receiver<bool>) -> BoxFuture<'static, UnitResult> + Send>;

/// A named unit of work started with the shared shutdown receiver.
pub struct SupervisedUnit {
    name: &'static str,
    start: UnitStart,
}

impl SupervisedUnit {
    pub fn new<F, Fut>(name: &'static str, start: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut + Send + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        Self {
            name,
            start: Box::new(move |shutdown| start(shutdown).boxed()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error("exited before shutdown was requested")]
    ExitedEarly,
    #[error("panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
#[error("{unit} failed: {error}")]
pub struct UnitFailure {
    pub unit: &'static str,
    #[source]
    pub error: UnitError,
}

#[derive(Debug)]
/// Why the supervisor stopped.
pub enum SupervisorExit {
    Cancelled { reason: String },
    UnitFailed(UnitFailure),
}

impl SupervisorExit {
    /// The cancellation reason, or the first unit failure as an error.
    pub fn into_result(self) -> Result<String, UnitFailure> {
        match self {
            Self::Cancelled { reason } => Ok(reason),
            Self::UnitFailed(failure) => Err(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Supervisor {
    grace: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_GRACE)
    }
}

impl Supervisor {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Starts every unit and waits for the first one to finish or for
    /// `cancel` to resolve with a reason. Either way all units are then told
    /// to stop and given up to the grace window to do so; units still running
    /// after that are aborted.
    pub async fn run<C>(&self, units: Vec<SupervisedUnit>, cancel: C) -> SupervisorExit
    where
        C: Future<Output = String>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut running = JoinSet::new();
        for unit in units {
            let name = unit.name;
            let future = (unit.start)(shutdown_rx.clone());
            running.spawn(async move { (name, AssertUnwindSafe(future).catch_unwind().await) });
            debug!(unit = name, "started supervised unit");
        }
        drop(shutdown_rx);

        tokio::pin!(cancel);
        let exit = tokio::select! {
            reason = &mut cancel => {
                info!(reason = %reason, "shutdown requested");
                SupervisorExit::Cancelled { reason }
            }
            Some(joined) = running.join_next() => {
                let failure = unit_failure(joined);
                error!(unit = failure.unit, error = %failure.error, "supervised unit failed");
                SupervisorExit::UnitFailed(failure)
            }
        };

        let _ = shutdown_tx.send(true);
        let drained = tokio::time::timeout(self.grace, async {
            while let Some(joined) = running.join_next().await {
                log_drained_unit(joined);
            }
        })
        .await
        .is_ok();
        if !drained {
            warn!(
                grace_ms = self.grace.as_millis() as u64,
                still_running = running.len(),
                "supervised units did not stop within the grace window"
            );
        }
        exit
    }
}

fn unit_failure(joined: Result<UnitOutcome, JoinError>) -> UnitFailure {
    match joined {
        Ok((unit, Ok(Ok(())))) => UnitFailure {
            unit,
            error: UnitError::ExitedEarly,
        },
        Ok((unit, Ok(Err(error)))) => UnitFailure {
            unit,
            error: UnitError::Monitor(error),
        },
        Ok((unit, Err(panic))) => UnitFailure {
            unit,
            error: UnitError::Panicked(panic_message(panic.as_ref())),
        },
        Err(join_error) => UnitFailure {
            unit: "supervised unit",
            error: UnitError::Panicked(join_error.to_string()),
        },
    }
}

fn log_drained_unit(joined: Result<UnitOutcome, JoinError>) {
    match joined {
        Ok((unit, Ok(Ok(())))) => debug!(unit, "supervised unit stopped"),
        Ok((unit, Ok(Err(error)))) => {
            warn!(unit, error = %error, "supervised unit failed during shutdown")
        }
        Ok((unit, Err(panic))) => warn!(
            unit,
            panic = %panic_message(panic.as_ref()),
            "supervised unit panicked during shutdown"
        ),
        Err(join_error) => warn!(error = %join_error, "supervised unit did not join"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
