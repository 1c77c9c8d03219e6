//! Async orchestration for checker runs.
//!
//! This module provides the tokio-based counterpart to [`crate::fanout`]:
//! the same one-unit-per-URL fan-out, plus a deadline, cancellation and a
//! lifecycle event stream.

mod orchestrator;

pub use orchestrator::{CheckEvent, CheckOrchestrator, CheckReport, OrchestratorConfig};
