//! Process bootstrap: tracing setup and OS shutdown signals.

use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Resolves with a human-readable reason once SIGINT or SIGTERM arrives.
pub(crate) async fn shutdown_signal() -> String {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => interrupt_reason(result).await,
                    _ = terminate.recv() => "received SIGTERM".to_string(),
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to install SIGTERM handler");
                interrupt_reason(tokio::signal::ctrl_c().await).await
            }
        }
    }
    #[cfg(not(unix))]
    {
        interrupt_reason(tokio::signal::ctrl_c().await).await
    }
}

async fn interrupt_reason(result: std::io::Result<()>) -> String {
    match result {
        Ok(()) => "received SIGINT".to_string(),
        Err(error) => {
            warn!(error = %error, "failed to listen for SIGINT");
            std::future::pending::<String>().await
        }
    }
}
