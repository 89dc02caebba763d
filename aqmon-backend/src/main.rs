use aqmon_backend::config::{AppConfig, DEFAULT_CONFIG_PATH};
use aqmon_backend::logging;
use aqmon_backend::module::feed::HttpPageFetcher;
use aqmon_backend::module::geolocation::ConfiguredLocation;
use aqmon_backend::module::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};
use aqmon_backend::service::{self, AppState};

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_or_default(&config_path)?;

    let _logging_guard = logging::init_logging(&config.log_dir, "aqmon-backend", &config.log_level)?;

    tracing::info!("aqmon backend starting...");
    tracing::info!("Feed query: {}", config.initial_url());

    let fetcher = HttpPageFetcher::new(Duration::from_secs(config.feed.request_timeout_secs))?;
    let geolocation = ConfiguredLocation::from_config(&config.geolocation);
    let state = AppState::build(&config, Arc::new(fetcher), Arc::new(geolocation));

    let mut task_manager = ScheduledTaskManager::new(
        ScheduledTaskConfig::from_app_config(&config),
        state.dispatcher.clone(),
        state.dashboard.clone(),
        state.renderer.clone(),
        state.status.clone(),
    );
    task_manager.start_all();

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, service::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server error")?;

    task_manager.shutdown().await;
    tracing::info!("aqmon backend stopped");
    Ok(())
}
