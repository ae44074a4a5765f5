//! Per-run directory layout and per-stage configuration.
//!
//! Everything a run writes lives under `<artifact_root>/<MM_DD_YYYY_HH_MM_SS>/`.
//! The configs are built once when the orchestrator starts and handed to the
//! stages by value.

use super::settings::{PipelineSettings, TransformationSettings};
use crate::core::StageKind;
use crate::ml::ForestParams;
use crate::utils::{parse_run_dir_name, run_dir_name};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Feature-store snapshot file name.
pub const FILE_NAME: &str = "data.csv";
/// Training split file name.
pub const TRAIN_FILE_NAME: &str = "train.csv";
/// Test split file name.
pub const TEST_FILE_NAME: &str = "test.csv";
/// Feature-store directory under the ingestion directory.
pub const DATA_INGESTION_FEATURE_STORE_DIR: &str = "feature_store";
/// Split directory under the ingestion directory.
pub const DATA_INGESTION_INGESTED_DIR: &str = "ingested";
/// Validation report file name.
pub const DATA_VALIDATION_REPORT_FILE_NAME: &str = "report.json";
/// Transformed matrices directory.
pub const DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR: &str = "transformed";
/// Fitted preprocessor directory.
pub const DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
/// Fitted preprocessor file name.
pub const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.json";
/// Transformed training matrix file name.
pub const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.json";
/// Transformed test matrix file name.
pub const TRANSFORMED_TEST_FILE_NAME: &str = "test.json";
/// Model bundle directory under the trainer directory.
pub const MODEL_TRAINER_TRAINED_MODEL_DIR: &str = "trained_model";
/// Model bundle file name.
pub const MODEL_FILE_NAME: &str = "model.json";
/// Summary written at the end of every run.
pub const RUN_SUMMARY_FILE_NAME: &str = "run_summary.json";

/// Identity and root directory of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPipelineConfig {
    /// Optional pipeline name.
    pub pipeline_name: String,
    /// `<artifact_root>/<timestamp>`.
    pub artifact_dir: PathBuf,
    /// The run timestamp used as directory name.
    pub timestamp: String,
}

impl TrainingPipelineConfig {
    /// Builds the run config for a run starting at `started_at`.
    #[must_use]
    pub fn new(settings: &PipelineSettings, started_at: &DateTime<Local>) -> Self {
        let timestamp = run_dir_name(started_at);
        Self {
            pipeline_name: settings.pipeline_name.clone(),
            artifact_dir: settings.artifact_root.join(&timestamp),
            timestamp,
        }
    }

    /// Directory of one stage inside this run.
    #[must_use]
    pub fn stage_dir(&self, kind: StageKind) -> PathBuf {
        self.artifact_dir.join(kind.as_str())
    }

    /// Path of the run summary.
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.artifact_dir.join(RUN_SUMMARY_FILE_NAME)
    }
}

/// Ingestion stage configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataIngestionConfig {
    /// Stage directory.
    pub data_ingestion_dir: PathBuf,
    /// Full snapshot of the exported collection.
    pub feature_store_file_path: PathBuf,
    /// Training split.
    pub train_file_path: PathBuf,
    /// Test split.
    pub test_file_path: PathBuf,
    /// Share of rows in the test split.
    pub train_test_split_ratio: f64,
    /// Optional split seed.
    pub split_seed: Option<u64>,
    /// Collection to export.
    pub collection_name: String,
    /// Identifier column dropped after export.
    pub id_column: String,
    /// Placeholder string normalized to missing.
    pub missing_sentinel: String,
}

impl DataIngestionConfig {
    /// Builds the ingestion config for a run.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(StageKind::Ingestion);
        let ingested = dir.join(DATA_INGESTION_INGESTED_DIR);
        Self {
            feature_store_file_path: dir.join(DATA_INGESTION_FEATURE_STORE_DIR).join(FILE_NAME),
            train_file_path: ingested.join(TRAIN_FILE_NAME),
            test_file_path: ingested.join(TEST_FILE_NAME),
            data_ingestion_dir: dir,
            train_test_split_ratio: settings.ingestion.test_ratio,
            split_seed: settings.ingestion.split_seed,
            collection_name: settings.ingestion.collection_name.clone(),
            id_column: settings.ingestion.id_column.clone(),
            missing_sentinel: settings.ingestion.missing_sentinel.clone(),
        }
    }
}

/// Validation stage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValidationConfig {
    /// Stage directory.
    pub data_validation_dir: PathBuf,
    /// Report written on every run.
    pub validation_report_file_path: PathBuf,
}

impl DataValidationConfig {
    /// Builds the validation config for a run.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig) -> Self {
        let dir = run.stage_dir(StageKind::Validation);
        Self {
            validation_report_file_path: dir.join(DATA_VALIDATION_REPORT_FILE_NAME),
            data_validation_dir: dir,
        }
    }
}

/// Transformation stage configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTransformationConfig {
    /// Stage directory.
    pub data_transformation_dir: PathBuf,
    /// Transformed training matrix.
    pub transformed_train_file_path: PathBuf,
    /// Transformed test matrix.
    pub transformed_test_file_path: PathBuf,
    /// Fitted preprocessor.
    pub transformed_object_file_path: PathBuf,
    /// Feature engineering and resampling options.
    pub options: TransformationSettings,
}

impl DataTransformationConfig {
    /// Builds the transformation config for a run.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(StageKind::Transformation);
        let transformed = dir.join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR);
        Self {
            transformed_train_file_path: transformed.join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: transformed.join(TRANSFORMED_TEST_FILE_NAME),
            transformed_object_file_path: dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            data_transformation_dir: dir,
            options: settings.transformation.clone(),
        }
    }
}

/// Training stage configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTrainerConfig {
    /// Stage directory.
    pub model_trainer_dir: PathBuf,
    /// Persisted model bundle.
    pub trained_model_file_path: PathBuf,
    /// Minimum resubstitution accuracy.
    pub expected_accuracy: f64,
    /// Forest hyperparameters.
    pub forest: ForestParams,
}

impl ModelTrainerConfig {
    /// Builds the trainer config for a run.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(StageKind::Training);
        Self {
            trained_model_file_path: dir.join(MODEL_TRAINER_TRAINED_MODEL_DIR).join(MODEL_FILE_NAME),
            model_trainer_dir: dir,
            expected_accuracy: settings.trainer.expected_accuracy,
            forest: settings.trainer.forest.clone(),
        }
    }
}

/// Finds the model bundle of the most recent run under `artifact_root`.
///
/// Directories whose names are not run timestamps, and runs without a model
/// bundle, are ignored.
pub fn latest_model_path(artifact_root: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut best: Option<(DateTime<Local>, PathBuf)> = None;

    for entry in std::fs::read_dir(artifact_root)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Ok(started) = parse_run_dir_name(&name) else {
            continue;
        };
        let model = entry
            .path()
            .join(StageKind::Training.as_str())
            .join(MODEL_TRAINER_TRAINED_MODEL_DIR)
            .join(MODEL_FILE_NAME);
        if !model.is_file() {
            continue;
        }
        if best.as_ref().map_or(true, |(t, _)| started > *t) {
            best = Some((started, model));
        }
    }

    Ok(best.map(|(_, path)| path))
}
