//! Remediation dispatch: queue, executor and background worker
//!
//! The HTTP acknowledgement and the remediation are decoupled. Handlers call
//! [`RemediationQueue::submit`], which records a pending entry and either
//! queues the job for the [`RemediationWorker`] or runs it inline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};

use super::config::DispatchMode;
use super::history::{RemediationLog, RemediationStatus};
use super::remediator::{RemediationError, Remediator};
use crate::alerts::WorkloadTarget;

/// One triggered remediation
#[derive(Debug, Clone)]
pub struct RemediationJob {
    pub id: u64,
    pub alertname: String,
    pub fingerprint: Option<String>,
    pub target: WorkloadTarget,
}

/// Runs jobs against a backend and records their outcome
pub struct Executor {
    remediator: Arc<dyn Remediator>,
    log: Arc<RemediationLog>,
    timeout: Option<Duration>,
}

impl Executor {
    pub fn new(remediator: Arc<dyn Remediator>, log: Arc<RemediationLog>) -> Self {
        Self {
            remediator,
            log,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &'static str {
        self.remediator.name()
    }

    pub fn log(&self) -> &Arc<RemediationLog> {
        &self.log
    }

    /// Run a job to completion and record the terminal status
    #[tracing::instrument(skip(self, job), fields(job_id = job.id, alertname = %job.alertname))]
    pub async fn run(&self, job: RemediationJob) -> RemediationStatus {
        self.log.update(job.id, RemediationStatus::Running);

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.remediator.remediate(&job.target))
                .await
                .unwrap_or(Err(RemediationError::TimedOut(limit))),
            None => self.remediator.remediate(&job.target).await,
        };

        let status = match result {
            Ok(report) => {
                tracing::info!(
                    backend = self.backend(),
                    namespace = %job.target.namespace,
                    selector = %job.target.selector,
                    deleted = report.deleted.len(),
                    "Remediation succeeded"
                );
                RemediationStatus::Succeeded {
                    deleted: report.deleted,
                    detail: report.detail,
                }
            }
            Err(RemediationError::TimedOut(limit)) => {
                tracing::error!(backend = self.backend(), "Remediation timed out after {:?}", limit);
                RemediationStatus::TimedOut
            }
            Err(e) => {
                tracing::error!(backend = self.backend(), "Remediation failed: {}", e);
                RemediationStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.log.update(job.id, status.clone());
        status
    }
}

/// Entry point used by request handlers
pub struct RemediationQueue {
    mode: DispatchMode,
    executor: Arc<Executor>,
    sender: mpsc::Sender<RemediationJob>,
    next_id: AtomicU64,
}

impl RemediationQueue {
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn backend(&self) -> &'static str {
        self.executor.backend()
    }

    pub fn log(&self) -> &Arc<RemediationLog> {
        self.executor.log()
    }

    /// Record and dispatch one remediation; returns the job id.
    ///
    /// Never fails: a job that cannot be queued is recorded as rejected.
    pub async fn submit(
        &self,
        alertname: impl Into<String>,
        fingerprint: Option<String>,
        target: WorkloadTarget,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let job = RemediationJob {
            id,
            alertname: alertname.into(),
            fingerprint,
            target,
        };

        self.log().record_pending(
            id,
            job.alertname.clone(),
            job.fingerprint.clone(),
            job.target.clone(),
            self.backend(),
        );

        match self.mode {
            DispatchMode::Inline => {
                // Own task, so a dropped request cannot abort the remediation
                let executor = Arc::clone(&self.executor);
                let task = tokio::spawn(async move { executor.run(job).await });
                if let Err(e) = task.await {
                    tracing::error!(job_id = id, "Remediation task failed: {}", e);
                    self.log().update(
                        id,
                        RemediationStatus::Failed {
                            error: e.to_string(),
                        },
                    );
                }
            }
            DispatchMode::Deferred => match self.sender.try_send(job) {
                Ok(()) => tracing::debug!(job_id = id, "Remediation queued"),
                Err(TrySendError::Full(job)) => {
                    tracing::warn!(job_id = job.id, "Remediation queue full, dropping job");
                    self.log().update(
                        job.id,
                        RemediationStatus::Rejected {
                            reason: "queue full".to_string(),
                        },
                    );
                }
                Err(TrySendError::Closed(job)) => {
                    tracing::warn!(job_id = job.id, "Remediation worker stopped, dropping job");
                    self.log().update(
                        job.id,
                        RemediationStatus::Rejected {
                            reason: "queue closed".to_string(),
                        },
                    );
                }
            },
        }

        id
    }
}

/// Background consumer of queued jobs. Each job runs as its own task, so
/// jobs may overlap.
pub struct RemediationWorker {
    executor: Arc<Executor>,
    jobs: mpsc::Receiver<RemediationJob>,
}

/// Create a connected queue and worker
pub fn channel(
    executor: Arc<Executor>,
    mode: DispatchMode,
    capacity: usize,
) -> (RemediationQueue, RemediationWorker) {
    let (sender, jobs) = mpsc::channel(capacity.max(1));

    let queue = RemediationQueue {
        mode,
        executor: Arc::clone(&executor),
        sender,
        next_id: AtomicU64::new(1),
    };
    let worker = RemediationWorker { executor, jobs };

    (queue, worker)
}

impl RemediationWorker {
    /// Start the background worker
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(self.run(shutdown_rx));

        WorkerHandle {
            handle,
            shutdown_tx,
        }
    }

    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(backend = self.executor.backend(), "Remediation worker started");

        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    tracing::info!("Remediation worker shutting down");
                    break;
                }
                job = self.jobs.recv() => match job {
                    Some(job) => {
                        let executor = Arc::clone(&self.executor);
                        in_flight.spawn(async move {
                            executor.run(job).await;
                        });
                    }
                    None => break,
                },
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!("Remediation task failed: {}", e);
                    }
                }
            }
        }

        // Jobs still waiting in the queue never started
        self.jobs.close();
        while let Ok(job) = self.jobs.try_recv() {
            tracing::warn!(job_id = job.id, "Cancelling queued remediation");
            self.executor
                .log()
                .update(job.id, RemediationStatus::Cancelled);
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                tracing::error!("Remediation task failed: {}", e);
            }
        }

        tracing::info!("Remediation worker stopped");
    }
}

/// Handle to a running worker. Dropping it also stops the worker.
pub struct WorkerHandle {
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl WorkerHandle {
    /// Stop accepting jobs, cancel queued ones and wait for running ones
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!("Remediation worker panicked: {}", e);
        }
    }
}
