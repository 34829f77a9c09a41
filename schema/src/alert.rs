//! Alert-forwarder payload shape
//!
//! The probe core never talks to a chat API itself. It exposes its failures
//! in the Alertmanager-like grouping an external forwarder consumes: a
//! top-level status plus a list of findings, each with a name, a
//! severity-like status, a description, and a start time.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Grouped findings handed to an external alert forwarder
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    /// "firing" when any finding is present, "resolved" otherwise
    pub status: String,
    /// One finding per failed probe
    pub alerts: Vec<AlertFinding>,
}

/// A single finding within an alert payload
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertFinding {
    /// Finding name, e.g. "AdGuard Home: Query log enabled"
    pub alert_name: String,
    /// Per-finding status ("firing")
    pub status: String,
    /// Severity label, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Human-readable description (the probe detail string)
    pub description: String,
    /// RFC3339 timestamp of when the condition was observed
    pub starts_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let payload = AlertPayload {
            status: "firing".to_string(),
            alerts: vec![AlertFinding {
                alert_name: "UniFi Controller: Login".to_string(),
                status: "firing".to_string(),
                severity: Some("critical".to_string()),
                description: "bad credentials".to_string(),
                starts_at: "2026-01-01T00:00:00+00:00".to_string(),
            }],
        };

        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["status"], "firing");
        assert_eq!(json["alerts"][0]["alertName"], "UniFi Controller: Login");
        assert_eq!(json["alerts"][0]["startsAt"], "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_severity_omitted_when_none() {
        let finding = AlertFinding {
            alert_name: "x".to_string(),
            status: "firing".to_string(),
            severity: None,
            description: "d".to_string(),
            starts_at: "t".to_string(),
        };
        let json = serde_json::to_string(&finding).expect("serialize");
        assert!(!json.contains("severity"));
    }
}
