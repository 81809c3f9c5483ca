use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{get_remediation, health_check, list_remediations, receive_alert, AppState};
use crate::remediation::{
    channel, DispatchMode, Executor, RemediationConfig, RemediationLog, RemediationWorker,
    WorkerHandle,
};

/// Server configuration, built once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub remediation: RemediationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            remediation: RemediationConfig::default(),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Alert webhook
        .route("/alert", post(receive_alert))
        // Remediation outcomes
        .route("/remediations", get(list_remediations))
        .route("/remediations/:id", get(get_remediation))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let remediation = &config.remediation;

    // Remediation backend and worker
    let remediator = remediation.build_remediator()?;
    let log = Arc::new(RemediationLog::new(remediation.history_capacity));
    let executor = Arc::new(Executor::new(remediator, log).with_timeout(remediation.timeout));
    let (queue, worker) = channel(executor, remediation.mode, remediation.queue_capacity);
    let worker_handle = start_worker(remediation.mode, worker);

    let state = Arc::new(AppState::new(remediation.rule.clone(), queue));

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting medic on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let running remediations finish
    if let Some(worker_handle) = worker_handle {
        worker_handle.stop().await;
    }

    tracing::info!("medic stopped");
    Ok(())
}

/// Only deferred dispatch needs the background worker
fn start_worker(mode: DispatchMode, worker: RemediationWorker) -> Option<WorkerHandle> {
    match mode {
        DispatchMode::Deferred => Some(worker.start()),
        DispatchMode::Inline => None,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, stopping remediation worker...");
}
