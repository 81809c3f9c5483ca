//! Remediation through the cluster CLI

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

use super::remediator::{RemediationError, RemediationReport, Remediator};
use crate::alerts::WorkloadTarget;

/// Runs `<program> [extra args] delete pod -n <namespace> -l <selector>`
#[derive(Debug, Clone)]
pub struct KubectlRemediator {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl KubectlRemediator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments placed before the delete command (e.g. `--context prod`)
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Full argument vector for a target
    pub fn args(&self, target: &WorkloadTarget) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend(
            [
                "delete",
                "pod",
                "-n",
                target.namespace.as_str(),
                "-l",
                target.selector.as_str(),
            ]
            .into_iter()
            .map(str::to_string),
        );
        args
    }
}

impl Default for KubectlRemediator {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl Remediator for KubectlRemediator {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    #[tracing::instrument(skip(self), fields(program = %self.program.display()))]
    async fn remediate(&self, target: &WorkloadTarget) -> Result<RemediationReport, RemediationError> {
        let args = self.args(target);
        tracing::debug!(?args, "Running remediation command");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RemediationError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemediationError::Failed {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(RemediationReport::new(
            parse_deleted(&stdout),
            stdout.trim(),
        ))
    }
}

/// Pod names from lines like `pod "backend-7d9f" deleted`
fn parse_deleted(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_suffix(" deleted")?;
            let rest = rest.strip_prefix("pod ")?;
            Some(rest.trim_matches('"').to_string())
        })
        .collect()
}
