//! The triage pipeline: orchestration, metrics, quarantine index.

pub mod engine;
pub mod metrics;
pub mod quarantine;
