//! Core domain model types for trainflow.
//!
//! This module contains the values passed around a pipeline run:
//! - Stage artifacts and classification metrics
//! - Stage kind, stage status and pipeline state enums
//! - Lifecycle events

mod artifact;
mod event;
mod status;

pub use artifact::{
    ClassificationMetrics, IngestionArtifact, TrainingArtifact, TransformationArtifact,
    ValidationArtifact,
};
pub use event::StageEvent;
pub use status::{PipelineState, StageKind, StageStatus};
