//! medic server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - MEDIC_HOST: Bind address (default: 0.0.0.0)
//! - MEDIC_PORT: Port number (default: 5000)
//! - MEDIC_ALERTNAME: Alert name that triggers remediation (default: HighCPUUsage)
//! - MEDIC_NAMESPACE: Namespace of the pods to delete (default: securebank)
//! - MEDIC_SELECTOR: Label selector of the pods to delete (default: app=backend)
//! - MEDIC_BACKEND: kubectl, api or dry-run (default: kubectl)
//! - MEDIC_REMEDIATION_MODE: deferred or inline (default: deferred)
//! - MEDIC_REMEDIATION_TIMEOUT_SECS: Per-remediation timeout, also applied to API backend
//!   requests; 0 disables (default: unset)
//! - MEDIC_QUEUE_CAPACITY / MEDIC_HISTORY_CAPACITY: (default: 1024 / 256)
//! - RUST_LOG: Log level (default: medic=info,tower_http=info)
//!
//! Backend specific:
//! - MEDIC_KUBECTL, MEDIC_KUBECTL_ARGS: CLI binary and extra leading arguments
//! - MEDIC_KUBE_API_SERVER: API server URL (default: from KUBERNETES_SERVICE_HOST/PORT)
//! - MEDIC_KUBE_TOKEN_FILE, MEDIC_KUBE_CA_FILE: Service account credentials
//! - MEDIC_KUBE_INSECURE: Skip TLS verification (default: false)

use medic::api::{run_server, ServerConfig};
use medic::remediation::{Backend, RemediationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medic=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse basic configuration from environment
    let host = std::env::var("MEDIC_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("MEDIC_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);

    let remediation = RemediationConfig::from_env()?;

    let config = ServerConfig {
        host,
        port,
        remediation,
    };

    let remediation = &config.remediation;
    tracing::info!("medic configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Trigger alert: {}", remediation.rule.alertname);
    tracing::info!(
        "  Target: namespace={} selector={}",
        remediation.rule.target.namespace,
        remediation.rule.target.selector
    );
    tracing::info!("  Mode: {}", remediation.mode);
    match &remediation.backend {
        Backend::Kubectl { program, args } => {
            tracing::info!("  Backend: kubectl ({})", program.display());
            if !args.is_empty() {
                tracing::info!("  Extra args: {}", args.join(" "));
            }
        }
        Backend::Api(settings) => {
            tracing::info!("  Backend: api ({})", settings.server);
            if settings.insecure {
                tracing::warn!("  TLS verification disabled");
            }
        }
        Backend::DryRun => tracing::info!("  Backend: dry-run (no pods will be deleted)"),
    }
    match remediation.timeout {
        Some(timeout) => tracing::info!("  Remediation timeout: {:?}", timeout),
        None => tracing::info!("  Remediation timeout: none"),
    }

    run_server(config).await
}
