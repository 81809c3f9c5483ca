//! Remediation: deleting the workloads an alert points at
//!
//! A [`Remediator`] performs the action (cluster CLI, API server, or dry
//! run). The [`RemediationQueue`] decouples it from the HTTP acknowledgement
//! and every outcome lands in the [`RemediationLog`].

pub mod config;
pub mod history;
pub mod kube_api;
pub mod kubectl;
pub mod remediator;
pub mod worker;

pub use config::{Backend, ConfigError, DispatchMode, RemediationConfig};
pub use history::{RemediationLog, RemediationRecord, RemediationStatus};
pub use kube_api::{KubeApiRemediator, KubeApiSettings};
pub use kubectl::KubectlRemediator;
pub use remediator::{DryRunRemediator, RemediationError, RemediationReport, Remediator};
pub use worker::{
    channel, Executor, RemediationJob, RemediationQueue, RemediationWorker, WorkerHandle,
};
