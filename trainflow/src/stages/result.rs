//! Per-stage execution records kept by the orchestrator.

use crate::core::{StageKind, StageStatus};
use crate::errors::{ErrorInfo, PipelineError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one stage during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageKind,
    /// Final status.
    pub status: StageStatus,
    /// When the stage started; absent for skipped stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage ended; absent for skipped stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Structured error if the stage failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl StageRecord {
    /// Creates a record for a stage that completed.
    #[must_use]
    pub fn completed(stage: StageKind, started_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            status: StageStatus::Ok,
            started_at: Some(started_at),
            ended_at: Some(Utc::now()),
            error: None,
        }
    }

    /// Creates a record for a stage that raised `error`.
    #[must_use]
    pub fn failed(stage: StageKind, started_at: DateTime<Utc>, error: &PipelineError) -> Self {
        Self {
            stage,
            status: StageStatus::Fail,
            started_at: Some(started_at),
            ended_at: Some(Utc::now()),
            error: Some(error.info()),
        }
    }

    /// Creates a record for a stage that never ran.
    #[must_use]
    pub fn skipped(stage: StageKind) -> Self {
        Self {
            stage,
            status: StageStatus::Skip,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    /// Returns the duration in milliseconds, or 0 for skipped stages.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64,
            _ => 0.0,
        }
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Ok
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Fail
    }
}
