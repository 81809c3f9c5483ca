//! Remediation rule: which alert triggers which action

use serde::{Deserialize, Serialize};
use std::fmt;

use super::payload::{AlertEntry, AlertNotification};

pub const DEFAULT_ALERTNAME: &str = "HighCPUUsage";
pub const DEFAULT_NAMESPACE: &str = "securebank";
pub const DEFAULT_SELECTOR: &str = "app=backend";

/// Pods to delete: everything in `namespace` matching the label `selector`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadTarget {
    pub namespace: String,
    pub selector: String,
}

impl WorkloadTarget {
    pub fn new(namespace: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: selector.into(),
        }
    }
}

impl Default for WorkloadTarget {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_SELECTOR)
    }
}

impl fmt::Display for WorkloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.selector)
    }
}

/// Pairs a sentinel alert name with a fixed remediation target.
///
/// The target is never templated from the alert: every match remediates the
/// same workloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationRule {
    pub alertname: String,
    pub target: WorkloadTarget,
}

impl RemediationRule {
    pub fn new(alertname: impl Into<String>, target: WorkloadTarget) -> Self {
        Self {
            alertname: alertname.into(),
            target,
        }
    }

    /// Whether an entry's `alertname` label equals the sentinel
    pub fn matches(&self, entry: &AlertEntry) -> bool {
        entry.alertname() == Some(self.alertname.as_str())
    }

    /// Matching entries in received order, one per entry (no de-duplication)
    pub fn select<'a>(
        &'a self,
        notification: &'a AlertNotification,
    ) -> impl Iterator<Item = &'a AlertEntry> + 'a {
        notification.alerts.iter().filter(move |entry| self.matches(entry))
    }
}

impl Default for RemediationRule {
    fn default() -> Self {
        Self::new(DEFAULT_ALERTNAME, WorkloadTarget::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_sentinel_only() {
        let rule = RemediationRule::default();

        let cpu = AlertEntry::default().with_label("alertname", "HighCPUUsage");
        let disk = AlertEntry::default().with_label("alertname", "DiskFull");
        let lower = AlertEntry::default().with_label("alertname", "highcpuusage");

        assert!(rule.matches(&cpu));
        assert!(!rule.matches(&disk));
        assert!(!rule.matches(&lower));
        assert!(!rule.matches(&AlertEntry::default()));
    }

    #[test]
    fn test_select_keeps_order_and_duplicates() {
        let rule = RemediationRule::default();
        let notification = AlertNotification::from_value(&json!({
            "alerts": [
                {"labels": {"alertname": "HighCPUUsage"}, "fingerprint": "one"},
                {"labels": {"alertname": "DiskFull"}, "fingerprint": "two"},
                {"labels": {"alertname": "HighCPUUsage"}, "fingerprint": "three"}
            ]
        }));

        let selected: Vec<_> = rule
            .select(&notification)
            .map(|e| e.fingerprint.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(selected, vec!["one", "three"]);
    }

    #[test]
    fn test_default_target() {
        let target = WorkloadTarget::default();
        assert_eq!(target.namespace, "securebank");
        assert_eq!(target.selector, "app=backend");
        assert_eq!(target.to_string(), "securebank/app=backend");
    }
}
