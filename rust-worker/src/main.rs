//! Bulk Mail Server - HTTP front end plus the background dispatch worker.
//!
//! This binary:
//! - Accepts send jobs over HTTP and enqueues them in memory
//! - Runs a single worker that sends one job at a time over SMTP
//! - Serves progress for polling clients
//! - Drains gracefully on SIGINT/SIGTERM

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bulkmail::{shutdown_channel, web, worker, AppState, Config, JobQueue, SmtpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        api_token_configured = config.api_token.is_some(),
        poll_interval_ms = config.poll_interval_ms,
        max_attempts = config.max_attempts,
        backoff_base_ms = config.backoff_base_ms,
        smtp_host = %config.smtp.host,
        smtp_port = config.smtp.port,
        smtp_starttls = config.smtp.enable_ssl,
        global_cc = config.smtp.global_cc.len(),
        "config_loaded"
    );

    // Start the dispatch worker
    let queue = JobQueue::new();
    let (trigger, shutdown) = shutdown_channel();
    let worker = worker::spawn(
        queue.clone(),
        Arc::new(SmtpTransport),
        config.worker_settings(),
        shutdown.clone(),
    );

    // One signal stops the worker and starts the HTTP drain at the same time
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = web::router(AppState::new(config, queue));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    let mut server_shutdown = shutdown;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.triggered().await })
        .await
        .context("Server error")?;

    // An in-flight job ends Cancelled
    worker.await.context("Worker task failed")?;

    info!("server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
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
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("server_shutting_down");
}
