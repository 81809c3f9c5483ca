//! The remediation capability and its outcome types

use async_trait::async_trait;
use serde::Serialize;

use crate::alerts::WorkloadTarget;

/// Deletes workloads matching a selector in a namespace
#[async_trait]
pub trait Remediator: Send + Sync {
    /// Short backend name used in logs and records
    fn name(&self) -> &'static str;

    /// Perform the remediation once. No retries.
    async fn remediate(&self, target: &WorkloadTarget) -> Result<RemediationReport, RemediationError>;
}

/// What a successful remediation did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemediationReport {
    /// Names of the pods the backend reported as deleted
    pub deleted: Vec<String>,
    pub detail: String,
}

impl RemediationReport {
    pub fn new(deleted: Vec<String>, detail: impl Into<String>) -> Self {
        Self {
            deleted,
            detail: detail.into(),
        }
    }
}

/// Remediation errors
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with {}: {stderr}", exit_label(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("Cluster API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read service account token: {0}")]
    Token(std::io::Error),

    #[error("Failed to read CA bundle: {0}")]
    CaFile(std::io::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remediation timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

/// Backend that only logs the action it would take
#[derive(Debug, Default)]
pub struct DryRunRemediator;

#[async_trait]
impl Remediator for DryRunRemediator {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn remediate(&self, target: &WorkloadTarget) -> Result<RemediationReport, RemediationError> {
        tracing::warn!(
            namespace = %target.namespace,
            selector = %target.selector,
            "Dry run: would delete matching pods"
        );
        Ok(RemediationReport::new(Vec::new(), "dry run"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Records every invocation; optionally fails or stalls
    #[derive(Default)]
    pub struct RecordingRemediator {
        pub calls: Arc<Mutex<Vec<WorkloadTarget>>>,
        pub fail: bool,
        pub delay: Option<Duration>,
    }

    impl RecordingRemediator {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Remediator for RecordingRemediator {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn remediate(
            &self,
            target: &WorkloadTarget,
        ) -> Result<RemediationReport, RemediationError> {
            self.calls.lock().push(target.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail {
                return Err(RemediationError::Failed {
                    code: Some(1),
                    stderr: "forbidden".to_string(),
                });
            }

            Ok(RemediationReport::new(
                vec!["backend-0".to_string()],
                "pod \"backend-0\" deleted",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_succeeds_without_deleting() {
        let report = DryRunRemediator
            .remediate(&WorkloadTarget::default())
            .await
            .unwrap();
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn test_failed_error_message() {
        let err = RemediationError::Failed {
            code: Some(1),
            stderr: "No resources found".to_string(),
        };
        assert_eq!(err.to_string(), "Command exited with 1: No resources found");

        let err = RemediationError::Failed {
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }
}
