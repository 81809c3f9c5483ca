//! Bounded in-memory log of remediation outcomes

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::alerts::WorkloadTarget;

/// Lifecycle of one remediation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemediationStatus {
    Pending,
    Running,
    Succeeded { deleted: Vec<String>, detail: String },
    Failed { error: String },
    TimedOut,
    /// Never queued (queue full or closed)
    Rejected { reason: String },
    /// Still queued at shutdown
    Cancelled,
}

impl RemediationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemediationStatus::Pending | RemediationStatus::Running)
    }
}

/// Observable outcome of one triggered remediation
#[derive(Debug, Clone, Serialize)]
pub struct RemediationRecord {
    pub id: u64,
    pub alertname: String,
    pub fingerprint: Option<String>,
    pub target: WorkloadTarget,
    pub backend: String,
    pub queued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RemediationStatus,
}

/// Keeps the most recent `capacity` records; the oldest are evicted first
pub struct RemediationLog {
    records: RwLock<VecDeque<RemediationRecord>>,
    capacity: usize,
}

impl RemediationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a new pending record
    pub fn record_pending(
        &self,
        id: u64,
        alertname: impl Into<String>,
        fingerprint: Option<String>,
        target: WorkloadTarget,
        backend: &str,
    ) {
        let record = RemediationRecord {
            id,
            alertname: alertname.into(),
            fingerprint,
            target,
            backend: backend.to_string(),
            queued_at: Utc::now(),
            finished_at: None,
            status: RemediationStatus::Pending,
        };

        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Set a record's status; terminal states also stamp `finished_at`.
    ///
    /// Returns false if the record was already evicted.
    pub fn update(&self, id: u64, status: RemediationStatus) -> bool {
        let mut records = self.records.write();
        match records.iter_mut().rev().find(|r| r.id == id) {
            Some(record) => {
                if status.is_terminal() {
                    record.finished_at = Some(Utc::now());
                }
                record.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: u64) -> Option<RemediationRecord> {
        self.records.read().iter().rev().find(|r| r.id == id).cloned()
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<RemediationRecord> {
        self.records.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RemediationLog {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(log: &RemediationLog, id: u64) {
        log.record_pending(id, "HighCPUUsage", None, WorkloadTarget::default(), "dry-run");
    }

    #[test]
    fn test_update_and_get() {
        let log = RemediationLog::new(8);
        pending(&log, 1);

        let record = log.get(1).unwrap();
        assert_eq!(record.status, RemediationStatus::Pending);
        assert!(record.finished_at.is_none());

        assert!(log.update(1, RemediationStatus::Running));
        assert!(log.get(1).unwrap().finished_at.is_none());

        assert!(log.update(
            1,
            RemediationStatus::Failed {
                error: "boom".to_string()
            }
        ));
        let record = log.get(1).unwrap();
        assert!(record.status.is_terminal());
        assert!(record.finished_at.is_some());

        assert!(!log.update(99, RemediationStatus::Cancelled));
    }

    #[test]
    fn test_evicts_oldest() {
        let log = RemediationLog::new(3);
        for id in 1..=5 {
            pending(&log, id);
        }

        assert_eq!(log.len(), 3);
        assert!(log.get(1).is_none());
        assert!(log.get(2).is_none());

        let ids: Vec<u64> = log.recent(10).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);

        let ids: Vec<u64> = log.recent(2).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[test]
    fn test_status_serialization() {
        let status = RemediationStatus::Succeeded {
            deleted: vec!["backend-1".to_string()],
            detail: "1 pod(s) deleted".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["deleted"][0], "backend-1");

        let json = serde_json::to_value(RemediationStatus::TimedOut).unwrap();
        assert_eq!(json, serde_json::json!({"state": "timed_out"}));
    }
}
