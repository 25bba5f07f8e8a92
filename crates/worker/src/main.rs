//! `autorun-worker` -- polls the automation job table and runs
//! browser tasks one at a time.
//!
//! See [`WorkerConfig`] for the environment variables it reads. Missing
//! or malformed settings, and a store that stays unreachable through
//! the startup retries, exit with status 1 before polling starts.

use std::sync::Arc;

use autorun_browser::WebDriverBrowser;
use autorun_store::PostgrestStore;
use autorun_worker::config::{self, WorkerConfig};
use autorun_worker::engine::JobEngine;
use autorun_worker::retry::retry_fixed;
use autorun_worker::tasks;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let log_level = std::env::var("LOG_LEVEL")
        .map(|v| v.trim().to_ascii_lowercase())
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config::log_filter(&log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid worker configuration");
        std::process::exit(1);
    });

    tracing::info!(
        store_url = %config.store_url,
        table = %config.table,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        webdriver_url = %config.webdriver_url,
        "Starting autorun-worker",
    );

    // --- Job store ---
    let store = PostgrestStore::new(config.postgrest()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Cannot build job store client");
        std::process::exit(1);
    });
    if let Err(e) = retry_fixed(&config.connect_retry(), "Connecting to job store", || {
        store.probe()
    })
    .await
    {
        tracing::error!(error = %e, "Cannot connect to job store");
        std::process::exit(1);
    }

    // --- Browser ---
    let browser = WebDriverBrowser::new(config.webdriver()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Cannot build WebDriver client");
        std::process::exit(1);
    });

    let registry = tasks::default_registry(Arc::new(browser), config.tasks());
    let engine = JobEngine::new(Arc::new(store), registry, config.poll_interval);

    // --- Shutdown ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    engine.run(cancel).await;
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
///
/// The engine finishes its current job before observing the cancel.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing current job");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current job");
        }
    }
}
