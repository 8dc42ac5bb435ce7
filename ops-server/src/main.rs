use std::path::PathBuf;
use std::time::Duration;

use ops_server::core::{BackgroundTasks, Config, Server, ServerState, TaskKind};
use ops_server::pipeline::CameraSupervisor;
use ops_server::analytics::TierRecalcJob;
use ops_server::init_logger_with_file;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let work_dir = std::env::var("WORK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    if !work_dir.exists() {
        std::fs::create_dir_all(&work_dir).expect("Failed to create work directory");
    }

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json_format = std::env::var("LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);
    let log_dir = work_dir.join("logs");
    init_logger_with_file(&log_level, json_format, log_dir.to_str());

    tracing::info!("Restaurant ops server starting...");

    let config = Config::from_env();
    let state = match ServerState::initialize(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize server state");
            std::process::exit(1);
        }
    };

    // Background tasks: camera supervisor (one worker per camera) and the
    // periodic tier recalculation
    let mut tasks = BackgroundTasks::new();
    let shutdown = tasks.shutdown_token();

    let supervisor = CameraSupervisor::new(state.clone(), shutdown.clone());
    tasks.spawn("camera_supervisor", TaskKind::Worker, supervisor.run());

    let tier_job = TierRecalcJob::new(state.clone(), shutdown.clone());
    tasks.spawn("tier_recalc", TaskKind::Periodic, tier_job.run());

    tasks.log_summary();

    // HTTP façade
    let server = Server::with_state(config.clone(), state.clone());
    let http_shutdown = shutdown.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = server.run(http_shutdown).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    // Run until ctrl-c, then stop workers between ticks and let in-flight
    // classifier calls finish or time out
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Shutdown signal received");

    tasks.shutdown(Duration::from_millis(config.shutdown_timeout_ms)).await;
    state.dispatcher.drain().await;
    http_handle.await.ok();

    tracing::info!("Shutdown complete");
}
