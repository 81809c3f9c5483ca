//! medic: alert-driven self-healing
//!
//! An HTTP webhook receiver for Alertmanager-style notifications. When an
//! alert entry's `alertname` matches a configured sentinel, the matching
//! pods are deleted so their controller recreates them.
//!
//! # Features
//!
//! - **Lenient payload handling**: missing or malformed `alerts` means "nothing to do"
//! - **Pluggable remediation**: cluster CLI, direct API server calls, or dry run
//! - **Acknowledge, then act**: remediation runs on a background worker
//! - **Observable outcomes**: every triggered remediation is recorded
//!
//! # Example
//!
//! ```no_run
//! use medic::alerts::{AlertNotification, RemediationRule};
//!
//! let payload = serde_json::json!({
//!     "alerts": [{"labels": {"alertname": "HighCPUUsage", "severity": "critical"}}]
//! });
//!
//! let rule = RemediationRule::default();
//! let notification = AlertNotification::from_value(&payload);
//! assert_eq!(rule.select(&notification).count(), 1);
//! ```

pub mod alerts;
pub mod api;
pub mod remediation;

// Re-export commonly used types
pub use alerts::{AlertEntry, AlertNotification, RemediationRule, WorkloadTarget};
pub use api::{run_server, ServerConfig};
pub use remediation::{RemediationConfig, RemediationError, Remediator};
