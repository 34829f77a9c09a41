//! Probe outcomes and the aggregated run report
//!
//! Outcomes are tri-state: a step either passed, failed, or was skipped.
//! Skips never affect the overall readiness of a run; a single failure does.
//! Records are kept in execution order because the rendered report follows
//! insertion order, not any sort.

use crate::alert::{AlertFinding, AlertPayload};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tri-state result of one probe step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// The check succeeded
    Passed,
    /// The check ran and did not succeed
    Failed,
    /// The check did not run (missing configuration or failed prerequisite)
    Skipped,
}

/// Outcome of one probe step with its explanatory detail
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    /// Pass/fail/skip classification
    pub outcome: Outcome,
    /// Status code, error message, or skip reason
    pub detail: String,
}

impl ProbeOutcome {
    pub fn passed(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Passed,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            detail: detail.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Skipped,
            detail: reason.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == Outcome::Skipped
    }
}

/// One (service, step, outcome) row of the report
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRecord {
    /// Service name (report section)
    pub service: String,
    /// Step label within the service
    pub step: String,
    /// What happened
    pub outcome: ProbeOutcome,
}

impl ProbeRecord {
    pub fn new(
        service: impl Into<String>,
        step: impl Into<String>,
        outcome: ProbeOutcome,
    ) -> Self {
        Self {
            service: service.into(),
            step: step.into(),
            outcome,
        }
    }

    /// "service: step" label used in the flat failure list
    pub fn label(&self) -> String {
        format!("{}: {}", self.service, self.step)
    }
}

/// Aggregated result of one probe run
///
/// Built once per run and handed to the printer and the exit-code decision;
/// no process-wide mutable state is involved.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// RFC3339 timestamp of when the run started
    pub started_at: String,
    /// Records in execution order
    pub records: Vec<ProbeRecord>,
}

impl Report {
    /// Empty report stamped with the current time
    pub fn new() -> Self {
        Self {
            started_at: Self::current_timestamp(),
            records: Vec::new(),
        }
    }

    /// Current timestamp in RFC3339 format
    pub fn current_timestamp() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    /// Append a record, preserving execution order
    pub fn push(&mut self, record: ProbeRecord) {
        self.records.push(record);
    }

    /// Append all records of a completed service
    pub fn extend(&mut self, records: impl IntoIterator<Item = ProbeRecord>) {
        self.records.extend(records);
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome.outcome == outcome)
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count(Outcome::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    /// Failed records, in execution order
    pub fn failures(&self) -> Vec<&ProbeRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_failed())
            .collect()
    }

    /// True iff nothing failed; skips do not count against readiness
    pub fn ready(&self) -> bool {
        self.failed() == 0
    }

    /// Convert failures into the shape an alert forwarder consumes
    pub fn to_alert_payload(&self) -> AlertPayload {
        let alerts: Vec<AlertFinding> = self
            .failures()
            .iter()
            .map(|r| AlertFinding {
                alert_name: r.label(),
                status: "firing".to_string(),
                severity: Some("critical".to_string()),
                description: r.outcome.detail.clone(),
                starts_at: self.started_at.clone(),
            })
            .collect();

        AlertPayload {
            status: if alerts.is_empty() {
                "resolved".to_string()
            } else {
                "firing".to_string()
            },
            alerts,
        }
    }
}
