//! Inbound alert notification model
//!
//! Extraction is lenient: a webhook body that does not look like an
//! Alertmanager notification still yields a (possibly empty) notification
//! instead of an error.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// Label carrying the alert's rule name
pub const ALERTNAME_LABEL: &str = "alertname";

/// A webhook notification carrying zero or more alert entries
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertNotification {
    pub receiver: Option<String>,
    pub status: Option<String>,
    pub group_key: Option<String>,
    /// Entries in the order they were received
    pub alerts: Vec<AlertEntry>,
}

/// One alert within a notification
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertEntry {
    pub status: Option<String>,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub starts_at: Option<String>,
    pub fingerprint: Option<String>,
}

impl AlertNotification {
    /// Extract a notification from an arbitrary JSON document.
    ///
    /// A missing or non-array `alerts` field is treated as an empty sequence.
    pub fn from_value(value: &Value) -> Self {
        let alerts = value
            .get("alerts")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(AlertEntry::from_value).collect())
            .unwrap_or_default();

        Self {
            receiver: string_field(value, "receiver"),
            status: string_field(value, "status"),
            group_key: string_field(value, "groupKey"),
            alerts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl AlertEntry {
    /// Extract an entry; anything that is not an object yields an entry with no labels
    pub fn from_value(value: &Value) -> Self {
        Self {
            status: string_field(value, "status"),
            labels: string_map(value.get("labels")),
            annotations: string_map(value.get("annotations")),
            starts_at: string_field(value, "startsAt"),
            fingerprint: string_field(value, "fingerprint"),
        }
    }

    /// Builder used by callers that construct entries directly
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn alertname(&self) -> Option<&str> {
        self.labels.get(ALERTNAME_LABEL).map(String::as_str)
    }

    pub fn severity(&self) -> Option<&str> {
        self.labels.get("severity").map(String::as_str)
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Keep only the string-valued members of a JSON object
fn string_map(value: Option<&Value>) -> HashMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
