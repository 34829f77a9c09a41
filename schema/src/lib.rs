//! Schema definitions for Preflight
//!
//! This crate contains the shared data structures used across the Preflight
//! workspace: service and probe declarations, probe outcomes, the aggregated
//! report, and the alert-forwarder payload shape. All types here implement
//! JSON Schema generation for external consumption.

pub mod alert;
pub mod report;
pub mod service;

pub use alert::{AlertFinding, AlertPayload};
pub use report::{Outcome, ProbeOutcome, ProbeRecord, Report};
pub use service::{EndpointSpec, Expect, HttpAuth, ProbeKind, ProbeStep, ServiceSpec};
