//! Stage kind, stage status and pipeline state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four stages of the training pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Pulls the collection and writes the train/test split.
    Ingestion,
    /// Checks the split tables against the schema declaration.
    Validation,
    /// Engineers, scales and rebalances features.
    Transformation,
    /// Fits the classifier and persists the model bundle.
    Training,
}

impl StageKind {
    /// All stages in the fixed execution order.
    pub const ALL: [Self; 4] = [
        Self::Ingestion,
        Self::Validation,
        Self::Transformation,
        Self::Training,
    ];

    /// The canonical stage name, also used as its artifact directory.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingestion => "data_ingestion",
            Self::Validation => "data_validation",
            Self::Transformation => "data_transformation",
            Self::Training => "model_trainer",
        }
    }

    /// The pipeline state while this stage runs.
    #[must_use]
    pub fn running_state(&self) -> PipelineState {
        match self {
            Self::Ingestion => PipelineState::Ingesting,
            Self::Validation => PipelineState::Validating,
            Self::Transformation => PipelineState::Transforming,
            Self::Training => PipelineState::Training,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The execution status of a single stage within a run.
///
/// Only outcomes are recorded; there is no in-progress status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully.
    Ok,
    /// Stage failed.
    Fail,
    /// Stage never ran because an earlier stage failed.
    Skip,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// State machine of a pipeline run.
///
/// Transitions are strictly linear; any stage error moves the run to
/// [`PipelineState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Ingestion is running (also the initial state).
    #[default]
    Ingesting,
    /// Validation is running.
    Validating,
    /// Transformation is running.
    Transforming,
    /// Training is running.
    Training,
    /// All four stages completed.
    Done,
    /// A stage failed; remaining stages were not run.
    Failed,
}

impl PipelineState {
    /// The state entered when the current stage succeeds.
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::Ingesting => Self::Validating,
            Self::Validating => Self::Transforming,
            Self::Transforming => Self::Training,
            Self::Training | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// The state entered when the current stage fails.
    #[must_use]
    pub fn fail(self) -> Self {
        match self {
            Self::Done => Self::Done,
            _ => Self::Failed,
        }
    }

    /// Returns true once the run can make no further progress.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingesting => write!(f, "ingesting"),
            Self::Validating => write!(f, "validating"),
            Self::Transforming => write!(f, "transforming"),
            Self::Training => write!(f, "training"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
