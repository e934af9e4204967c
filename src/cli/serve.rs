//! Serve command - runs the HTTP server

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::create_router;
use crate::api::state::UsageServiceTrait;
use crate::config::AppConfig;
use crate::infrastructure::observability::{init_metrics, init_tracing, shutdown_tracing};

/// Run the server until SIGINT or SIGTERM
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging, &config.observability.tracing);

    let metrics = init_metrics(&config.observability.metrics);
    let state = crate::create_app_state_with_config(&config).await?;

    let retention = spawn_retention_task(
        state.usage_service.clone(),
        config.usage.retention(),
        config.usage.purge_interval(),
    );

    let app = create_router(state, &config, metrics);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Seedora API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    retention.abort();
    shutdown_tracing();
    info!("Server shutdown complete");

    Ok(())
}

/// Periodically delete usage records older than `retention`.
/// The first purge runs immediately.
pub fn spawn_retention_task(
    usage: Arc<dyn UsageServiceTrait>,
    retention: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match usage.purge_expired(retention).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired usage records"),
                Err(e) => warn!(error = %e, "Usage purge failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApiKeyId, ApiUsage, UserId};
    use crate::infrastructure::usage::{InMemoryUsageRepository, UsageService};
    use chrono::Utc;

    #[tokio::test]
    async fn test_retention_task_purges_on_start() {
        let repo = Arc::new(InMemoryUsageRepository::new());
        let service = Arc::new(UsageService::new(repo));
        let key = ApiKeyId::generate();

        for age_days in [40, 1] {
            service
                .record(
                    ApiUsage::new(key.clone(), UserId::generate(), "/api/v1/predict", "POST")
                        .with_timestamp(Utc::now() - chrono::Duration::days(age_days)),
                )
                .await
                .unwrap();
        }

        let handle = spawn_retention_task(
            service.clone(),
            chrono::Duration::days(30),
            Duration::from_secs(3600),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(service.count_for_key(&key).await.unwrap(), 1);
    }
}
