//! Billing worker binary
//!
//! # Usage
//!
//! ```bash
//! BILLING_DATABASE_URL=postgres://localhost/billing cargo run --bin billing-worker
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string
//! * `BILLING_LOG_LEVEL` - Default log filter (default: info); `RUST_LOG` overrides it
//! * `BILLING_LOG_JSON` - Emit JSON log lines (default: false)
//! * `BILLING_DATABASE__MAX_CONNECTIONS` - Pool size (default: 10)
//! * `BILLING_ACCRUAL__TASK_QUEUE` - Task queue name (default: CREATE_BILL_QUEUE)
//! * `BILLING_ACCRUAL__AUDIT_INTERVAL_SECS` - Auditor period (default: 300)
//! * `BILLING_ACCRUAL__ACTIVITY__START_TO_CLOSE_TIMEOUT_MS` - Activity timeout (default: 60000)
//! * `BILLING_ACCRUAL__ACTIVITY__RETRY__MAX_ATTEMPTS` - Activity attempts (default: 5)

use anyhow::Context;
use billing_worker::{init_tracing, Worker, WorkerConfig};
use infra_db::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Local development convenience
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("Failed to load worker configuration")?;
    init_tracing(&config.log_level, config.log_json);

    tracing::info!(task_queue = %config.accrual.task_queue, "Starting billing worker");

    let pool = create_pool(config.database_config())
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mut worker = Worker::postgres(config.accrual.clone(), pool);
    worker
        .start()
        .await
        .context("Failed to recover accrual processes")?;

    shutdown_signal().await;

    worker.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
