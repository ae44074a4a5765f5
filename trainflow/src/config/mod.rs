//! Configuration: layered settings, the schema declaration and the per-run
//! directory layout.

pub mod paths;
mod schema;
mod settings;

pub use paths::{
    latest_model_path, DataIngestionConfig, DataTransformationConfig, DataValidationConfig,
    ModelTrainerConfig, TrainingPipelineConfig,
};
pub use schema::{ColumnSpec, SchemaDeclaration};
pub use settings::{
    load_settings, BinaryMapping, IngestionSettings, PipelineSettings, ResamplingSettings,
    TrainerSettings, TransformationSettings, ENV_PREFIX,
};
