use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixeltrace_worker::callback::CallbackClient;
use pixeltrace_worker::config::RunnerConfig;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pixeltrace_worker=info,indexer=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = match RunnerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid runner configuration");
            return ExitCode::from(2);
        }
    };
    tracing::debug!(?config, "Loaded runner configuration");

    let client = CallbackClient::new(config.callback_url.clone(), config.callback_secret.clone());

    match pixeltrace_worker::run_job(&config, &client).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(job_id = %config.job_id, error = %e, "Could not report job result");
            ExitCode::FAILURE
        }
    }
}
