use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixeltrace_api::config::{ProviderConfig, ServerConfig};
use pixeltrace_api::router::build_app_router;
use pixeltrace_api::state::AppState;
use pixeltrace_db::{JobStore, MemoryJobStore, PgJobStore};
use pixeltrace_provider::{ComputeProvider, HttpProvider, ProcessProvider};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store: Arc<dyn JobStore> = match &config.database_url {
        Some(database_url) => {
            let pool = pixeltrace_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            pixeltrace_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            pixeltrace_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgJobStore::new(pool))
        }
        None => {
            tracing::info!(max_jobs = config.max_jobs, "DATABASE_URL not set, using in-memory job store");
            Arc::new(MemoryJobStore::with_capacity(config.max_jobs))
        }
    };

    // --- Compute provider ---
    let provider: Arc<dyn ComputeProvider> = match &config.provider {
        ProviderConfig::Http {
            url,
            api_key,
            timeout_secs,
        } => {
            tracing::info!(endpoint = %url, "Using HTTP compute provider");
            Arc::new(
                HttpProvider::new(url.clone())
                    .with_api_key(api_key.clone())
                    .with_timeout(Duration::from_secs(*timeout_secs)),
            )
        }
        ProviderConfig::Process { command } => {
            let provider = match ProcessProvider::from_command_line(command) {
                Ok(provider) => provider,
                Err(e) => {
                    tracing::error!(error = %e, "Invalid RUNNER_COMMAND");
                    std::process::exit(2);
                }
            };
            tracing::info!(command = %provider.command_line(), "Using local process provider");
            Arc::new(provider.with_callback_secret(config.callback_secret.clone()))
        }
    };

    if config.callback_secret.is_none() {
        tracing::warn!("CALLBACK_SECRET not set, callbacks are accepted without authentication");
    }
    tracing::info!(callback_url = %config.callback_url(), "Runner callbacks will be sent here");

    // --- App state + router ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let state = AppState::new(config, store, provider);
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let stop = Arc::new(Notify::new());
    let serve = axum::serve(listener, app).with_graceful_shutdown({
        let stop = Arc::clone(&stop);
        async move { stop.notified().await }
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => {
            tracing::error!(result = ?result, "Server exited unexpectedly");
            std::process::exit(1);
        }
        _ = shutdown_signal() => {}
    }

    // --- Drain in-flight requests ---
    tracing::info!(timeout_secs = drain_timeout.as_secs(), "Shutdown signal received, draining connections");
    stop.notify_one();
    match tokio::time::timeout(drain_timeout, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Graceful shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task failed"),
        Err(_) => tracing::warn!("Drain timeout elapsed, dropping remaining connections"),
    }
}

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pixeltrace_api=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
