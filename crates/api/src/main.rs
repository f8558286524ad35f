use std::net::SocketAddr;
use std::sync::Arc;

use slidecast_api::config::{LogFormat, ServerConfig};
use slidecast_api::engine::JobDispatcher;
use slidecast_api::router::build_app_router;
use slidecast_api::state::AppState;
use slidecast_api::ws;
use slidecast_events::{EventBus, JobRegistry};
use slidecast_pipeline::{builtin, PipelineRunner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // --- Tracing ---
    init_tracing(config.log_format);
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Job registry and event bus ---
    let registry = Arc::new(JobRegistry::new(config.backlog_retention));
    let bus = EventBus::new(registry, config.observer_queue_capacity);

    // --- Pipeline ---
    let collaborators = match builtin::collaborators(&config.pipeline) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            tracing::error!(error = %e, "Invalid pipeline configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        dry_run = config.pipeline.dry_run,
        narration = ?collaborators.narration.names(),
        output_dir = %config.pipeline.output_dir.display(),
        "Pipeline collaborators ready",
    );
    let runner = PipelineRunner::new(Arc::new(collaborators), &config.pipeline);
    let dispatcher = Arc::new(JobDispatcher::new(bus.clone(), runner));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), config.heartbeat_interval());

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        bus,
        dispatcher: Arc::clone(&dispatcher),
        ws_manager: Arc::clone(&ws_manager),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = match config.host.parse() {
        Ok(ip) => SocketAddr::new(ip, config.port),
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Runners publish their `cancelled` status before sockets are closed.
    dispatcher.shutdown(config.shutdown_timeout()).await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "slidecast_api=debug,slidecast_pipeline=debug,slidecast_events=info,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
