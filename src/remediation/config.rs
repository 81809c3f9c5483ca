//! Remediation configuration
//!
//! Read once at startup from `MEDIC_*` environment variables and validated
//! before the server binds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use super::kube_api::{KubeApiRemediator, KubeApiSettings};
use super::kubectl::KubectlRemediator;
use super::remediator::{DryRunRemediator, RemediationError, Remediator};
use crate::alerts::rule::{DEFAULT_ALERTNAME, DEFAULT_NAMESPACE, DEFAULT_SELECTOR};
use crate::alerts::{RemediationRule, WorkloadTarget};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// When a triggered remediation runs relative to the acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Acknowledge first, run on the background worker
    #[default]
    Deferred,
    /// Run before acknowledging; the outcome is still only recorded
    Inline,
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" | "async" => Ok(DispatchMode::Deferred),
            "inline" | "sync" => Ok(DispatchMode::Inline),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Deferred => write!(f, "deferred"),
            DispatchMode::Inline => write!(f, "inline"),
        }
    }
}

/// Which remediation backend to build
#[derive(Debug, Clone)]
pub enum Backend {
    /// Shell out to the cluster CLI
    Kubectl { program: PathBuf, args: Vec<String> },
    /// Call the API server directly
    Api(KubeApiSettings),
    /// Log only
    DryRun,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Kubectl { .. } => "kubectl",
            Backend::Api(_) => "api",
            Backend::DryRun => "dry-run",
        }
    }
}

/// Remediation settings
#[derive(Debug, Clone)]
pub struct RemediationConfig {
    pub rule: RemediationRule,
    pub backend: Backend,
    pub mode: DispatchMode,
    /// None means the backend may run indefinitely
    pub timeout: Option<Duration>,
    pub queue_capacity: usize,
    pub history_capacity: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            rule: RemediationRule::default(),
            backend: Backend::Kubectl {
                program: PathBuf::from("kubectl"),
                args: Vec::new(),
            },
            mode: DispatchMode::Deferred,
            timeout: None,
            queue_capacity: 1024,
            history_capacity: 256,
        }
    }
}

impl RemediationConfig {
    /// Load configuration from environment variables
    ///
    /// MEDIC_ALERTNAME=HighCPUUsage
    /// MEDIC_NAMESPACE=securebank
    /// MEDIC_SELECTOR=app=backend
    /// MEDIC_BACKEND=kubectl|api|dry-run
    /// MEDIC_REMEDIATION_MODE=deferred|inline
    /// MEDIC_REMEDIATION_TIMEOUT_SECS=30
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let alertname = var("MEDIC_ALERTNAME").unwrap_or_else(|| DEFAULT_ALERTNAME.to_string());
        let namespace = var("MEDIC_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let selector = var("MEDIC_SELECTOR").unwrap_or_else(|| DEFAULT_SELECTOR.to_string());

        let timeout = parse_number::<u64>(&var, "MEDIC_REMEDIATION_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let backend = match var("MEDIC_BACKEND")
            .unwrap_or_else(|| "kubectl".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "kubectl" => Backend::Kubectl {
                program: var("MEDIC_KUBECTL")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("kubectl")),
                args: var("MEDIC_KUBECTL_ARGS")
                    .map(|args| args.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
            },
            "api" => Backend::Api(api_settings(&var, timeout)?),
            "dry-run" | "dryrun" | "log" => Backend::DryRun,
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let mode = match var("MEDIC_REMEDIATION_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.mode,
        };

        let queue_capacity = parse_number::<usize>(&var, "MEDIC_QUEUE_CAPACITY")?
            .unwrap_or(defaults.queue_capacity);
        let history_capacity = parse_number::<usize>(&var, "MEDIC_HISTORY_CAPACITY")?
            .unwrap_or(defaults.history_capacity);

        let config = Self {
            rule: RemediationRule::new(alertname, WorkloadTarget::new(namespace, selector)),
            backend,
            mode,
            timeout,
            queue_capacity,
            history_capacity,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check names, selector syntax and capacities
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rule.alertname.trim().is_empty() {
            return Err(ConfigError::EmptyAlertname);
        }
        validate_namespace(&self.rule.target.namespace)?;
        validate_selector(&self.rule.target.selector)?;

        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("MEDIC_QUEUE_CAPACITY"));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("MEDIC_HISTORY_CAPACITY"));
        }

        Ok(())
    }

    /// Build the configured backend
    pub fn build_remediator(&self) -> Result<Arc<dyn Remediator>, RemediationError> {
        let remediator: Arc<dyn Remediator> = match &self.backend {
            Backend::Kubectl { program, args } => {
                Arc::new(KubectlRemediator::new(program.clone()).with_args(args.clone()))
            }
            Backend::Api(settings) => Arc::new(KubeApiRemediator::new(settings.clone())?),
            Backend::DryRun => Arc::new(DryRunRemediator),
        };
        Ok(remediator)
    }
}

fn api_settings<F>(var: &F, timeout: Option<Duration>) -> Result<KubeApiSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let server = match var("MEDIC_KUBE_API_SERVER") {
        Some(server) => server,
        None => {
            let host = var("KUBERNETES_SERVICE_HOST").ok_or(ConfigError::MissingApiServer)?;
            let port = var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|| "443".to_string());
            if host.contains(':') {
                format!("https://[{}]:{}", host, port)
            } else {
                format!("https://{}:{}", host, port)
            }
        }
    };

    let token_file = var("MEDIC_KUBE_TOKEN_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(SERVICE_ACCOUNT_DIR).join("token"));

    let ca_file = var("MEDIC_KUBE_CA_FILE").map(PathBuf::from).or_else(|| {
        let default = Path::new(SERVICE_ACCOUNT_DIR).join("ca.crt");
        default.exists().then_some(default)
    });

    let insecure = var("MEDIC_KUBE_INSECURE")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    Ok(KubeApiSettings {
        server,
        token_file,
        ca_file,
        insecure,
        timeout,
    })
}

fn parse_number<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(None),
    }
}

fn namespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("namespace pattern is valid")
    })
}

fn selector_term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let key = r"(?:[A-Za-z0-9][-A-Za-z0-9.]*/)?[A-Za-z0-9](?:[-A-Za-z0-9_.]*[A-Za-z0-9])?";
        let value = r"(?:[A-Za-z0-9](?:[-A-Za-z0-9_.]*[A-Za-z0-9])?)?";
        Regex::new(&format!(
            r"^(?:!?{key}|{key}\s*(?:==|!=|=)\s*{value})$",
            key = key,
            value = value
        ))
        .expect("selector pattern is valid")
    })
}

/// Namespaces are DNS-1123 labels
pub fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    if namespace.len() > 63 || !namespace_pattern().is_match(namespace) {
        return Err(ConfigError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Equality (`k=v`, `k==v`, `k!=v`) and existence (`k`, `!k`) terms, comma separated
pub fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(selector.to_string()));
    }

    let valid = selector
        .split(',')
        .all(|term| selector_term_pattern().is_match(term.trim()));

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidSelector(selector.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Alert name must not be empty")]
    EmptyAlertname,

    #[error("Invalid namespace '{0}': must be a lowercase DNS label")]
    InvalidNamespace(String),

    #[error("Invalid label selector '{0}'")]
    InvalidSelector(String),

    #[error("Unknown remediation backend '{0}' (expected kubectl, api or dry-run)")]
    UnknownBackend(String),

    #[error("Unknown remediation mode '{0}' (expected deferred or inline)")]
    UnknownMode(String),

    #[error("Invalid number for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("No API server configured: set MEDIC_KUBE_API_SERVER or KUBERNETES_SERVICE_HOST")]
    MissingApiServer,
}
