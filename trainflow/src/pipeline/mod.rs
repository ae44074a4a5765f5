//! Pipeline orchestration.
//!
//! [`TrainingPipeline`] owns the per-stage configuration, runs the four stages
//! in their fixed order and threads each artifact into the next stage.

mod orchestrator;


pub use orchestrator::{PipelineOutcome, PipelineRunReport, RunArtifacts, TrainingPipeline};
