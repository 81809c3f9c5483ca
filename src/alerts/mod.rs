//! Alert notifications and the rule that decides when to remediate
//!
//! Parses inbound webhook payloads into ordered alert entries and matches
//! them against a sentinel alert name.

pub mod payload;
pub mod rule;

pub use payload::{AlertEntry, AlertNotification, ALERTNAME_LABEL};
pub use rule::{RemediationRule, WorkloadTarget};
