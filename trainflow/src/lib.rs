//! # Trainflow
//!
//! A linear training pipeline for tabular classification.
//!
//! A run executes four stages in a fixed order, each consuming the artifact of
//! the one before it:
//!
//! - **Ingestion**: export a document-store collection, snapshot it and split it
//!   into train and test tables
//! - **Validation**: check both tables against the schema declaration; a mismatch
//!   is reported, not raised
//! - **Transformation**: gated on validation; engineer, scale and rebalance the
//!   features and persist the fitted preprocessor
//! - **Training**: fit a random forest, gate on accuracy and persist a model
//!   bundle that predicts from raw tables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trainflow::prelude::*;
//!
//! let settings = load_settings(Some(Path::new("config/trainflow.toml")))?;
//! let schema = SchemaDeclaration::load(&settings.schema_path)?;
//! let store = Arc::new(DocumentStore::connect(settings.require_database_url()?)?);
//!
//! let pipeline = TrainingPipeline::new(settings, schema, Arc::new(CollectionSource::new(store)));
//! let artifact = pipeline.run().await?;
//! println!("accuracy: {}", artifact.metrics().accuracy);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod data;
pub mod errors;
pub mod events;
pub mod ml;
pub mod pipeline;
pub mod stages;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{load_settings, PipelineSettings, SchemaDeclaration};
    pub use crate::context::{ExecutionContext, RunContext, RunIdentity, StageContext};
    pub use crate::core::{
        ClassificationMetrics, IngestionArtifact, PipelineState, StageEvent, StageKind,
        StageStatus, TrainingArtifact, TransformationArtifact, ValidationArtifact,
    };
    pub use crate::data::{CollectionSource, DocumentStore, RecordSource, Table};
    pub use crate::errors::{ErrorInfo, PipelineError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::ml::ModelBundle;
    pub use crate::pipeline::{PipelineOutcome, PipelineRunReport, TrainingPipeline};
    pub use crate::stages::Stage;
}
